//! End-to-end population against the in-memory chain

use agora_common::{
    Block, BlockHash, ForkSettings, Header, Input, NetworkProfile, OutPoint,
    Output, PrevoutValidation, RuleFork, Transaction, TxHash,
};
use agora_module_populator::{
    Branch, Dispatcher, FastChain, InMemoryChain, PopulateError, Populator, StoredOutput,
    TransactionPosition,
};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Counts lookups reaching the wrapped chain
struct Counted {
    inner: InMemoryChain,
    calls: AtomicUsize,
}

impl Counted {
    fn new(inner: InMemoryChain) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FastChain for Counted {
    fn output(
        &self,
        outpoint: &OutPoint,
        branch_height: u64,
        require_confirmed: bool,
    ) -> Result<Option<StoredOutput>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.output(outpoint, branch_height, require_confirmed)
    }

    fn is_unspent_transaction(
        &self,
        hash: &TxHash,
        branch_height: u64,
        require_confirmed: bool,
    ) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.is_unspent_transaction(hash, branch_height, require_confirmed)
    }

    fn transaction_position(&self, hash: &TxHash) -> Result<Option<TransactionPosition>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.transaction_position(hash)
    }
}

fn coinbase(height: u64) -> Transaction {
    Transaction::new(
        1,
        vec![Input::new(OutPoint::null(), height.to_le_bytes().to_vec(), 0xffff_ffff)],
        vec![Output::new(5_000_000_000, vec![0x51])],
        0,
    )
}

fn spender(outpoints: &[OutPoint], value: u64) -> Transaction {
    Transaction::new(
        1,
        outpoints.iter().map(|outpoint| Input::new(*outpoint, vec![], 0xffff_ffff)).collect(),
        vec![Output::new(value, vec![0x51]), Output::new(1, vec![0x52])],
        0,
    )
}

fn block(
    previous: BlockHash,
    settings: &ForkSettings,
    height: u64,
    transactions: Vec<Transaction>,
) -> Block {
    Block::new(
        Header {
            version: 1,
            previous_block_hash: previous,
            timestamp: 1_000 + height as u32,
            ..Header::default()
        },
        transactions,
        settings.context(height, 1_000 + height as u32),
    )
}

/// Regtest chain of coinbase-only blocks up to `height`, returning the tip hash
/// and the coinbase outpoints by height
fn build_chain(settings: &ForkSettings, height: u64) -> (InMemoryChain, BlockHash, Vec<OutPoint>) {
    let chain = InMemoryChain::new();
    let mut previous = BlockHash::default();
    let mut coinbases = Vec::new();

    for h in 0..=height {
        let block = block(previous, settings, h, vec![coinbase(h)]);
        coinbases.push(OutPoint::new(*block.transactions[0].hash(), 0));
        chain.confirm_block(h, &block);
        previous = block.hash();
    }

    (chain, previous, coinbases)
}

fn populator(chain: Arc<Counted>, threads: usize) -> Populator {
    Populator::with_dispatcher(Dispatcher::with_threads(threads).unwrap(), chain, true)
}

#[tokio::test]
async fn two_block_branch_resolves_chain_and_branch_outputs() {
    let settings = ForkSettings::new(NetworkProfile::Regtest);
    let (chain, tip, coinbases) = build_chain(&settings, 20);
    let chain = Arc::new(Counted::new(chain));

    // Block 21 spends coinbase 3, block 22 spends coinbase 3 again, coinbase 4,
    // and an output created in block 21
    let first_spend = spender(&[coinbases[3]], 100);
    let lower = block(tip, &settings, 21, vec![coinbase(21), first_spend.clone()]);
    let upper = block(
        lower.hash(),
        &settings,
        22,
        vec![
            coinbase(22),
            spender(&[coinbases[3], coinbases[4], OutPoint::new(*first_spend.hash(), 1)], 50),
        ],
    );

    let mut branch = Branch::new(20);
    assert!(branch.push_front(upper));
    assert!(branch.push_front(lower));
    assert_eq!(branch.top_height(), 22);

    let branch = populator(chain.clone(), 3).populate_block(branch).await.unwrap();
    let inputs = branch.top().unwrap().transactions[1].inputs();

    let double_spent = &inputs[0].prevout;
    assert!(double_spent.spent);
    assert!(double_spent.confirmed);
    assert!(double_spent.is_cached());

    let unspent = &inputs[1].prevout;
    assert!(!unspent.spent);
    assert!(unspent.coinbase);
    assert_eq!(unspent.height, 4);
    assert_eq!(unspent.median_time_past, 1_004);

    let from_branch = &inputs[2].prevout;
    assert!(!from_branch.spent);
    assert!(!from_branch.coinbase);
    assert_eq!(from_branch.height, 21);
    assert_eq!(from_branch.cache, Some(Output::new(1, vec![0x52])));

    let coinbase_prevout = &branch.top().unwrap().transactions[0].inputs()[0].prevout;
    assert!(coinbase_prevout.confirmed);
    assert!(!coinbase_prevout.is_cached());
}

#[tokio::test]
async fn checkpointed_block_performs_no_lookups() {
    let settings = ForkSettings::new(NetworkProfile::Mainnet);
    let chain = Arc::new(Counted::new(InMemoryChain::new()));

    let checkpoint = settings.checkpoints().last().unwrap().height;
    let candidate = block(
        BlockHash::new([1; 32]),
        &settings,
        checkpoint,
        vec![coinbase(checkpoint), spender(&[OutPoint::new(TxHash::new([2; 32]), 0)], 1)],
    );
    assert!(candidate.context.is_under_checkpoint());

    let mut branch = Branch::new(checkpoint - 1);
    assert!(branch.push_front(candidate));

    let branch = populator(chain.clone(), 4).populate_block(branch).await.unwrap();
    assert_eq!(chain.calls(), 0);
    assert_eq!(
        branch.top().unwrap().transactions[1].inputs()[0].prevout,
        PrevoutValidation::default()
    );
}

#[tokio::test]
async fn results_do_not_depend_on_thread_count() {
    let settings = ForkSettings::new(NetworkProfile::Regtest);
    let (chain, tip, coinbases) = build_chain(&settings, 40);
    let chain = Arc::new(Counted::new(chain));

    let transactions: Vec<Transaction> = std::iter::once(coinbase(41))
        .chain(coinbases[1..40].chunks(3).map(|outpoints| spender(outpoints, 7)))
        .collect();

    let mut populated = Vec::new();
    for threads in [1, 2, 5, 16] {
        let mut branch = Branch::new(40);
        assert!(branch.push_front(block(tip, &settings, 41, transactions.clone())));
        let branch = populator(chain.clone(), threads).populate_block(branch).await.unwrap();
        populated.push(branch.into_blocks());
    }

    for other in &populated[1..] {
        assert_eq!(other, &populated[0]);
    }
}

#[tokio::test]
async fn pool_transaction_lifecycle() {
    let settings = ForkSettings::new(NetworkProfile::Regtest);
    let (chain, _, coinbases) = build_chain(&settings, 10);
    let chain = Arc::new(Counted::new(chain));
    let populator = populator(chain.clone(), 2);

    let mut tx = spender(&[coinbases[2], coinbases[5]], 900);
    tx.validation.state = Some(settings.context(11, 0));
    let tx = populator.populate_transaction(tx).await.unwrap();

    assert!(!tx.validation.duplicate);
    assert_eq!(tx.total_input_value(), 10_000_000_000);
    assert_eq!(tx.fees(), 10_000_000_000 - 901);

    // Once pooled, the same transaction is a duplicate spend
    chain.inner.pool_transaction(&tx, settings.enabled_forks());
    let calls = chain.calls();
    let hash = *tx.hash();
    let result = populator.populate_transaction(tx).await;

    assert_eq!(result.unwrap_err(), PopulateError::DuplicateSpend { hash });
    assert_eq!(chain.calls(), calls + 1);
}

#[test]
fn callback_style_with_shared_pool() {
    let pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap());
    let settings = ForkSettings::new(NetworkProfile::Regtest);
    let (chain, tip, coinbases) = build_chain(&settings, 5);
    let chain = Arc::new(Counted::new(chain));
    let populator = Populator::with_dispatcher(Dispatcher::new(pool), chain, false);

    let mut branch = Branch::new(5);
    assert!(branch.push_front(block(
        tip,
        &settings,
        6,
        vec![coinbase(6), spender(&coinbases[1..5], 1)],
    )));

    let results = Mutex::new(Vec::new());
    populator
        .block_populator()
        .populate(&mut branch, |result| results.lock().unwrap().push(result));

    assert_eq!(results.into_inner().unwrap(), vec![Ok(())]);
    let top = branch.top().unwrap();
    assert!(top.transactions[1].inputs().iter().all(|input| input.prevout.is_cached()));
    // Relay disabled, so pool membership is never looked up
    assert!(!top.transactions[1].validation.pooled);
    assert!(top.context.is_enabled(RuleFork::AllowCollisions));
}
