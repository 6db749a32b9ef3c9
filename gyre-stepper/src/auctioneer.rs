//! Arbitration between competing stepping extensions.

/// Decides, once per step, which of the configured extensions take part.
///
/// Bids are collected before the first trial of a step and the selection
/// holds across shrink-and-retry iterations. The result is a bitmask over
/// the extension list, bit `i` for extension `i`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Auctioneer {
    /// Every extension with a positive bid participates.
    #[default]
    AllValid,
    /// Only the extensions sharing the highest positive bid participate.
    HighestBidWins,
}

impl Auctioneer {
    #[must_use]
    pub fn select(&self, bids: &[u32]) -> u32 {
        debug_assert!(bids.len() <= u32::BITS as usize);
        let threshold = match self {
            Self::AllValid => 1,
            Self::HighestBidWins => {
                let Some(&highest) = bids.iter().max() else {
                    return 0;
                };
                highest.max(1)
            }
        };
        bids.iter()
            .enumerate()
            .filter(|&(_, &bid)| bid >= threshold)
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }
}
