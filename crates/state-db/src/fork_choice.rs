use basalt_common::Digest;

/// Decides which complete fork becomes (or remains) the database's head.
///
/// A trait rather than a hardcoded rule because this is the one Open
/// Question the specification explicitly leaves open: the reference policy
/// is FIFO (first block to complete wins and nothing displaces it), but
/// swapping in e.g. a heaviest-fork rule should not require touching
/// [`crate::database::Database`].
pub trait ForkChoice: Send + Sync {
    /// `current` is `None` only when the database has no head yet.
    /// `candidate` just became complete. Returns the id that should be head
    /// afterwards.
    fn choose(&self, current: Option<Digest>, candidate: Digest) -> Digest;
}

/// First node to complete is, and remains, the head - later forks completing
/// never displace it. This matches the specification's "no reorgs" stance.
#[derive(Debug, Default, Clone, Copy)]
pub struct FifoForkChoice;

impl ForkChoice for FifoForkChoice {
    fn choose(&self, current: Option<Digest>, candidate: Digest) -> Digest {
        current.unwrap_or(candidate)
    }
}
