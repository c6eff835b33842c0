//! Worker lifecycle: `installing -> installed -> activating -> active`.

use std::fmt;

use color_eyre::{eyre::eyre, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Installing,
  Installed,
  Activating,
  Active,
}

impl LifecycleState {
  /// Whether `next` is a legal successor of this state.
  ///
  /// `Activating -> Installed` is the rollback taken when the activation
  /// sweep fails, so activation can be retried.
  pub fn can_transition_to(self, next: LifecycleState) -> bool {
    use LifecycleState::*;
    matches!(
      (self, next),
      (Installing, Installed) | (Installed, Activating) | (Activating, Active) | (Activating, Installed)
    )
  }
}

impl fmt::Display for LifecycleState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      LifecycleState::Installing => "installing",
      LifecycleState::Installed => "installed",
      LifecycleState::Activating => "activating",
      LifecycleState::Active => "active",
    };
    f.write_str(name)
  }
}

/// Tracks the worker's lifecycle state and rejects out-of-order events.
#[derive(Debug)]
pub struct Lifecycle {
  state: LifecycleState,
}

impl Default for Lifecycle {
  fn default() -> Self {
    Self::new()
  }
}

impl Lifecycle {
  pub fn new() -> Self {
    Self {
      state: LifecycleState::Installing,
    }
  }

  pub fn state(&self) -> LifecycleState {
    self.state
  }

  pub fn is_active(&self) -> bool {
    self.state == LifecycleState::Active
  }

  /// Move to `next`, or fail without changing state.
  pub fn transition(&mut self, next: LifecycleState) -> Result<()> {
    if !self.state.can_transition_to(next) {
      return Err(eyre!(
        "Invalid lifecycle transition: {} -> {}",
        self.state,
        next
      ));
    }
    tracing::debug!(from = %self.state, to = %next, "Lifecycle transition");
    self.state = next;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_happy_path() {
    let mut lifecycle = Lifecycle::new();
    assert_eq!(lifecycle.state(), LifecycleState::Installing);

    lifecycle.transition(LifecycleState::Installed).unwrap();
    lifecycle.transition(LifecycleState::Activating).unwrap();
    lifecycle.transition(LifecycleState::Active).unwrap();

    assert!(lifecycle.is_active());
  }

  #[test]
  fn test_cannot_skip_install() {
    let mut lifecycle = Lifecycle::new();
    let err = lifecycle.transition(LifecycleState::Activating).unwrap_err();

    assert!(err.to_string().contains("installing -> activating"));
    assert_eq!(lifecycle.state(), LifecycleState::Installing);
  }

  #[test]
  fn test_active_is_terminal() {
    let mut lifecycle = Lifecycle::new();
    lifecycle.transition(LifecycleState::Installed).unwrap();
    lifecycle.transition(LifecycleState::Activating).unwrap();
    lifecycle.transition(LifecycleState::Active).unwrap();

    assert!(lifecycle.transition(LifecycleState::Installing).is_err());
    assert!(lifecycle.transition(LifecycleState::Activating).is_err());
    assert!(lifecycle.is_active());
  }

  #[test]
  fn test_failed_activation_rolls_back() {
    let mut lifecycle = Lifecycle::new();
    lifecycle.transition(LifecycleState::Installed).unwrap();
    lifecycle.transition(LifecycleState::Activating).unwrap();
    lifecycle.transition(LifecycleState::Installed).unwrap();

    // and can be retried
    lifecycle.transition(LifecycleState::Activating).unwrap();
    lifecycle.transition(LifecycleState::Active).unwrap();
  }
}
