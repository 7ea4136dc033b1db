//! Legacy signature operation counting over raw script bytes

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKSIGVERIFY: u8 = 0xad;
const OP_CHECKMULTISIG: u8 = 0xae;
const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

/// Multisig ops count at the maximum key count when not accurately counted
pub const MULTISIG_DEFAULT_SIGOPS: usize = 20;

/// Count signature operations, skipping pushed data.
///
/// A truncated push ends the count at the point of truncation.
pub fn count_sigops(script: &[u8]) -> usize {
    let mut total = 0;
    let mut position = 0;

    while position < script.len() {
        let opcode = script[position];
        position += 1;

        let push = match opcode {
            0x01..=0x4b => opcode as usize,
            OP_PUSHDATA1 => match script.get(position) {
                Some(length) => {
                    position += 1;
                    *length as usize
                }
                None => break,
            },
            OP_PUSHDATA2 => match script.get(position..position + 2) {
                Some(bytes) => {
                    position += 2;
                    u16::from_le_bytes([bytes[0], bytes[1]]) as usize
                }
                None => break,
            },
            OP_PUSHDATA4 => match script.get(position..position + 4) {
                Some(bytes) => {
                    position += 4;
                    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
                }
                None => break,
            },
            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                total += 1;
                0
            }
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                total += MULTISIG_DEFAULT_SIGOPS;
                0
            }
            _ => 0,
        };

        position = position.saturating_add(push);
    }

    total
}
