use alloy_primitives::{Bloom, Log};

/// Outcome of a single executed transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Receipt {
    /// Whether the transaction finished without reverting or halting.
    pub success: bool,
    /// Gas consumed by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// 2048-bit filter over the addresses and topics of `logs`.
    pub bloom: Bloom,
    /// Logs emitted by this transaction, in order.
    pub logs: Vec<Log>,
}

/// Accumulates the log filter over `logs`.
pub fn logs_bloom<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for log in logs {
        bloom.accrue_log(log);
    }
    bloom
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, Bytes};

    #[test]
    fn no_logs_yield_the_zero_bloom() {
        assert_eq!(logs_bloom([]), Bloom::ZERO);
    }

    #[test]
    fn bloom_covers_address_and_topics() {
        let log = Log::new_unchecked(
            address!("ea674fdde714fd979de3edf0f56aa9716b898ec8"),
            vec![b256!("000000000000000000000000000000000000000000000000000000000000002a")],
            Bytes::new(),
        );
        let bloom = logs_bloom([&log]);
        assert_ne!(bloom, Bloom::ZERO);
        assert!(bloom.contains_input(alloy_primitives::BloomInput::Raw(log.address.as_slice())));
        assert!(bloom.contains_input(alloy_primitives::BloomInput::Raw(
            log.topics()[0].as_slice()
        )));
    }
}
