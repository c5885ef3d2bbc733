//! # Slave Session
//!
//! Scoped ownership of the controller's slave mode.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::{CommandPose, ReportedPose, SlvMode};
use log::{error, info};

use super::{CommandError, HardwareLink, LinkError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Exclusive borrow of a link whose controller is in slave mode.
///
/// The controller is returned to normal mode when the session is released, or when it is dropped
/// on any other exit path (early return, error propagation, panic).
pub struct SlaveSession<'a, L: HardwareLink + ?Sized> {
    link: &'a mut L,

    /// False once the controller has been returned to normal mode
    active: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SlaveSessionError {
    #[error("Could not enter slave mode: {0}")]
    EnterFailed(LinkError),

    #[error("Could not exit slave mode: {0}")]
    ExitFailed(LinkError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<'a, L: HardwareLink + ?Sized> SlaveSession<'a, L> {
    /// Put the controller into slave mode.
    pub fn acquire(link: &'a mut L) -> Result<Self, SlaveSessionError> {
        link.change_mode(SlvMode::Slave)
            .map_err(SlaveSessionError::EnterFailed)?;

        info!("Controller in {} mode", SlvMode::Slave);

        Ok(Self { link, active: true })
    }

    pub fn num_joints(&self) -> usize {
        self.link.num_joints()
    }

    /// Send one slave move, see [`HardwareLink::send_pose`].
    pub fn send_pose(&mut self, pose: &CommandPose) -> Result<ReportedPose, CommandError> {
        self.link.send_pose(pose)
    }

    /// Return the controller to normal mode, reporting any failure.
    pub fn release(mut self) -> Result<(), SlaveSessionError> {
        self.active = false;

        self.link
            .change_mode(SlvMode::Normal)
            .map_err(SlaveSessionError::ExitFailed)?;

        info!("Controller returned to {} mode", SlvMode::Normal);

        Ok(())
    }
}

impl<'a, L: HardwareLink + ?Sized> Drop for SlaveSession<'a, L> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        match self.link.change_mode(SlvMode::Normal) {
            Ok(_) => info!(
                "Slave session dropped, controller returned to {} mode",
                SlvMode::Normal
            ),
            Err(e) => error!("Could not exit slave mode while dropping the session: {}", e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::ManualClock;
    use crate::hw_link::SimLink;
    use std::time::Duration;

    fn sim() -> SimLink {
        SimLink::new(6, Duration::from_millis(10), ManualClock::default())
    }

    #[test]
    fn test_release() {
        let mut link = sim();

        let session = SlaveSession::acquire(&mut link).unwrap();
        session.release().unwrap();

        assert_eq!(link.mode(), SlvMode::Normal);
        assert_eq!(link.mode_history(), &[SlvMode::Slave, SlvMode::Normal]);
    }

    #[test]
    fn test_drop_exits_slave_mode() {
        let mut link = sim();

        {
            let _session = SlaveSession::acquire(&mut link).unwrap();
        }

        assert_eq!(link.mode_history(), &[SlvMode::Slave, SlvMode::Normal]);
    }

    #[test]
    fn test_panic_exits_slave_mode() {
        let mut link = sim();

        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _session = SlaveSession::acquire(&mut link).unwrap();
            panic!("failure in the loop");
        }));

        assert!(res.is_err());
        assert_eq!(link.mode(), SlvMode::Normal);
    }

    #[test]
    fn test_rejected_enter() {
        let mut link = sim().with_mode_change_rejected();

        {
            let res = SlaveSession::acquire(&mut link);
            assert!(matches!(res, Err(SlaveSessionError::EnterFailed(_))));
        }

        assert_eq!(link.mode(), SlvMode::Normal);
    }
}
