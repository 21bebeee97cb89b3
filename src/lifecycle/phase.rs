use std::{fmt, str::FromStr};

use anyhow::anyhow;

/// A named point in a bean's lifecycle.
///
/// Phases are totally ordered by declaration, and a bean only ever moves
/// forward through them. Each "...ING" phase is a transitional phase that is
/// held while the corresponding hook runs; the others are settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum BeanPhase {
    #[default]
    Disabled,
    Enabled,
    Creating,
    Created,
    Configuring,
    Configured,
    Initializing,
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
    Destroying,
    Destroyed,
}

impl BeanPhase {
    /// Every phase, in lifecycle order.
    pub const ALL: [BeanPhase; 14] = [
        BeanPhase::Disabled,
        BeanPhase::Enabled,
        BeanPhase::Creating,
        BeanPhase::Created,
        BeanPhase::Configuring,
        BeanPhase::Configured,
        BeanPhase::Initializing,
        BeanPhase::Initialized,
        BeanPhase::Starting,
        BeanPhase::Started,
        BeanPhase::Stopping,
        BeanPhase::Stopped,
        BeanPhase::Destroying,
        BeanPhase::Destroyed,
    ];

    /// Position in the lifecycle, starting at 0 for `Disabled`.
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// True while a hook is in progress.
    pub const fn is_running(self) -> bool {
        matches!(
            self,
            BeanPhase::Creating
                | BeanPhase::Configuring
                | BeanPhase::Initializing
                | BeanPhase::Starting
                | BeanPhase::Stopping
                | BeanPhase::Destroying
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, BeanPhase::Destroyed)
    }

    pub const fn name(self) -> &'static str {
        match self {
            BeanPhase::Disabled => "DISABLED",
            BeanPhase::Enabled => "ENABLED",
            BeanPhase::Creating => "CREATING",
            BeanPhase::Created => "CREATED",
            BeanPhase::Configuring => "CONFIGURING",
            BeanPhase::Configured => "CONFIGURED",
            BeanPhase::Initializing => "INITIALIZING",
            BeanPhase::Initialized => "INITIALIZED",
            BeanPhase::Starting => "STARTING",
            BeanPhase::Started => "STARTED",
            BeanPhase::Stopping => "STOPPING",
            BeanPhase::Stopped => "STOPPED",
            BeanPhase::Destroying => "DESTROYING",
            BeanPhase::Destroyed => "DESTROYED",
        }
    }
}

impl fmt::Display for BeanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BeanPhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BeanPhase::ALL
            .into_iter()
            .find(|phase| phase.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("unknown bean phase: `{s}`"))
    }
}
