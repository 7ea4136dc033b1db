//! Transactions, their inputs and outputs

use crate::encoding::{varint_size, WireWriter};
use crate::hash::TxHash;
use crate::script::count_sigops;
use crate::validation::{PrevoutValidation, TxValidation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an output of a previous transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the creating transaction
    pub hash: TxHash,

    /// Position of the output within it
    pub index: u32,
}

impl OutPoint {
    /// Index used by the null outpoint of a coinbase input
    pub const NULL_INDEX: u32 = u32::MAX;

    pub fn new(hash: TxHash, index: u32) -> Self {
        Self { hash, index }
    }

    /// The outpoint a coinbase input carries
    pub fn null() -> Self {
        Self::new(TxHash::default(), Self::NULL_INDEX)
    }

    pub fn is_null(&self) -> bool {
        self.index == Self::NULL_INDEX && self.hash.is_null()
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.index)
    }
}

/// Transaction output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub value: u64,
    pub script: Vec<u8>,
}

impl Output {
    pub fn new(value: u64, script: Vec<u8>) -> Self {
        Self { value, script }
    }

    fn serialized_size(&self) -> usize {
        8 + varint_size(self.script.len() as u64) + self.script.len()
    }
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub previous_output: OutPoint,
    pub script: Vec<u8>,
    pub sequence: u32,

    /// State of the referenced previous output
    pub prevout: PrevoutValidation,
}

impl Input {
    pub fn new(previous_output: OutPoint, script: Vec<u8>, sequence: u32) -> Self {
        Self {
            previous_output,
            script,
            sequence,
            prevout: PrevoutValidation::default(),
        }
    }

    fn serialized_size(&self) -> usize {
        32 + 4 + varint_size(self.script.len() as u64) + self.script.len() + 4
    }
}

/// Exclusive access to one input's previous-output sidecar
#[derive(Debug)]
pub struct PrevoutSlot<'a> {
    pub outpoint: &'a OutPoint,
    pub prevout: &'a mut PrevoutValidation,
}

/// A transaction split into its read-only structure and writable sidecars
#[derive(Debug)]
pub struct TransactionParts<'a> {
    pub hash: &'a TxHash,
    pub outputs: &'a [Output],
    pub validation: &'a mut TxValidation,
    pub prevouts: Vec<PrevoutSlot<'a>>,
}

/// A transaction with its identity hash cached at construction
///
/// Structure is immutable once built so the cached hash cannot go stale;
/// only the validation sidecars are writable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    version: u32,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    locktime: u32,
    hash: TxHash,

    /// Transaction-level validation state
    pub validation: TxValidation,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new(0, Vec::new(), Vec::new(), 0)
    }
}

impl Transaction {
    pub fn new(version: u32, inputs: Vec<Input>, outputs: Vec<Output>, locktime: u32) -> Self {
        let mut tx = Self {
            version,
            inputs,
            outputs,
            locktime,
            hash: TxHash::default(),
            validation: TxValidation::default(),
        };
        tx.hash = TxHash::digest(&tx.to_bytes());
        tx
    }

    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn locktime(&self) -> u32 {
        self.locktime
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// A coinbase has exactly one input, spending the null outpoint
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Canonical serialisation
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(self.serialized_size());
        writer.push_u32(self.version);
        writer.push_varint(self.inputs.len() as u64);
        for input in &self.inputs {
            writer.push_bytes(input.previous_output.hash.as_ref());
            writer.push_u32(input.previous_output.index);
            writer.push_var_bytes(&input.script);
            writer.push_u32(input.sequence);
        }
        writer.push_varint(self.outputs.len() as u64);
        for output in &self.outputs {
            writer.push_u64(output.value);
            writer.push_var_bytes(&output.script);
        }
        writer.push_u32(self.locktime);
        writer.into_vec()
    }

    pub fn serialized_size(&self) -> usize {
        4 + varint_size(self.inputs.len() as u64)
            + self.inputs.iter().map(Input::serialized_size).sum::<usize>()
            + varint_size(self.outputs.len() as u64)
            + self.outputs.iter().map(Output::serialized_size).sum::<usize>()
            + 4
    }

    /// Legacy signature operations over input and output scripts
    pub fn signature_operations(&self) -> usize {
        let inputs: usize = self.inputs.iter().map(|input| count_sigops(&input.script)).sum();
        let outputs: usize = self.outputs.iter().map(|output| count_sigops(&output.script)).sum();
        inputs + outputs
    }

    /// Sum of resolved previous output values; unresolved inputs count zero
    pub fn total_input_value(&self) -> u64 {
        self.inputs
            .iter()
            .filter_map(|input| input.prevout.cache.as_ref())
            .fold(0u64, |total, output| total.saturating_add(output.value))
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().fold(0u64, |total, output| total.saturating_add(output.value))
    }

    /// Input value less output value, floored at zero
    pub fn fees(&self) -> u64 {
        self.total_input_value().saturating_sub(self.total_output_value())
    }

    /// Mutable access to one input's previous-output sidecar
    pub fn prevout_mut(&mut self, index: usize) -> Option<&mut PrevoutValidation> {
        self.inputs.get_mut(index).map(|input| &mut input.prevout)
    }

    /// Split into shared structure and exclusive per-input sidecars
    pub fn parts_mut(&mut self) -> TransactionParts<'_> {
        let Self {
            inputs,
            outputs,
            hash,
            validation,
            ..
        } = self;

        TransactionParts {
            hash,
            outputs,
            validation,
            prevouts: inputs
                .iter_mut()
                .map(|input| PrevoutSlot {
                    outpoint: &input.previous_output,
                    prevout: &mut input.prevout,
                })
                .collect(),
        }
    }
}
