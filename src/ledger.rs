//! Bookkeeping for graphics objects.
//!
//! Every wrapper in the renderer reports to a [`Ledger`] when it creates or
//! destroys a device object, so a clean shutdown can be checked as a 1:1
//! match between creations and destructions of each kind.

use log::debug;
use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Kind {
    Buffer,
    Memory,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    RenderPass,
    Framebuffer,
    CommandPool,
    Semaphore,
    Fence,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub created: u32,
    pub destroyed: u32,
}

impl Tally {
    pub fn live(&self) -> i64 {
        i64::from(self.created) - i64::from(self.destroyed)
    }
}

#[derive(Debug, Default)]
pub struct Ledger {
    tallies: RefCell<BTreeMap<Kind, Tally>>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    pub fn created(&self, kind: Kind) {
        let mut tallies = self.tallies.borrow_mut();
        let tally = tallies.entry(kind).or_default();
        tally.created += 1;
        debug!("created {:?} ({} live)", kind, tally.live());
    }

    pub fn destroyed(&self, kind: Kind) {
        let mut tallies = self.tallies.borrow_mut();
        let tally = tallies.entry(kind).or_default();
        tally.destroyed += 1;
        debug!("destroyed {:?} ({} live)", kind, tally.live());
    }

    pub fn tally(&self, kind: Kind) -> Tally {
        self.tallies
            .borrow()
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    /// Kinds whose creations and destructions do not match, with the
    /// difference. Negative means destroyed more often than created.
    pub fn unbalanced(&self) -> Vec<(Kind, i64)> {
        self.tallies
            .borrow()
            .iter()
            .filter(|(_, tally)| tally.live() != 0)
            .map(|(kind, tally)| (*kind, tally.live()))
            .collect()
    }

    pub fn is_balanced(&self) -> bool {
        self.unbalanced().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ledger_is_balanced() {
        assert!(Ledger::new().is_balanced());
    }

    #[test]
    fn matched_pairs_are_balanced() {
        let ledger = Ledger::new();
        ledger.created(Kind::Buffer);
        ledger.created(Kind::Memory);
        ledger.destroyed(Kind::Memory);
        ledger.destroyed(Kind::Buffer);
        assert!(ledger.is_balanced());
        assert_eq!(
            ledger.tally(Kind::Buffer),
            Tally {
                created: 1,
                destroyed: 1
            }
        );
    }

    #[test]
    fn leaked_object_is_reported() {
        let ledger = Ledger::new();
        ledger.created(Kind::Fence);
        ledger.created(Kind::Fence);
        ledger.destroyed(Kind::Fence);
        assert!(!ledger.is_balanced());
        assert_eq!(ledger.unbalanced(), vec![(Kind::Fence, 1)]);
    }

    #[test]
    fn double_destroy_is_reported() {
        let ledger = Ledger::new();
        ledger.created(Kind::Pipeline);
        ledger.destroyed(Kind::Pipeline);
        ledger.destroyed(Kind::Pipeline);
        assert_eq!(ledger.unbalanced(), vec![(Kind::Pipeline, -1)]);
    }

    #[test]
    fn untouched_kind_has_zero_tally() {
        assert_eq!(Ledger::new().tally(Kind::RenderPass), Tally::default());
    }
}
