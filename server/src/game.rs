use bingo_shared::{ConnectionId, Phase, Role};
use log::info;

/// The global phase plus the two singleton roles that steer it: the admin
/// who advances phases and the display that renders forwarded commands.
#[derive(Debug, Clone, Default)]
pub struct GameState {
    phase: Phase,
    admin: Option<ConnectionId>,
    display: Option<ConnectionId>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Applies the one cyclic transition and returns the new phase.
    pub fn advance(&mut self) -> Phase {
        let previous = self.phase;
        self.phase = previous.next();
        info!("Phase {:?} -> {:?}", previous, self.phase);
        self.phase
    }

    /// Selections only count while a round is being played.
    pub fn accepts_selections(&self) -> bool {
        self.phase == Phase::Playing
    }

    /// The connection currently steering the game, if any.
    pub fn admin(&self) -> Option<ConnectionId> {
        self.admin
    }

    /// The connection rendering the big screen, if any. It only receives
    /// relayed commands.
    pub fn display(&self) -> Option<ConnectionId> {
        self.display
    }

    /// Checks whether `id` may advance the phase or relay commands.
    pub fn is_admin(&self, id: ConnectionId) -> bool {
        self.admin == Some(id)
    }

    /// Claims a singleton role. The last claimant wins.
    pub fn assign(&mut self, role: Role, id: ConnectionId) {
        let slot = match role {
            Role::Admin => &mut self.admin,
            Role::Display => &mut self.display,
            Role::Player => return,
        };
        if let Some(previous) = slot.replace(id) {
            if previous != id {
                info!("{:?} role moved from connection {} to {}", role, previous, id);
            }
        }
    }

    /// Clears whichever singleton role `id` holds and reports it.
    pub fn release(&mut self, id: ConnectionId) -> Option<Role> {
        if self.admin == Some(id) {
            self.admin = None;
            return Some(Role::Admin);
        }
        if self.display == Some(id) {
            self.display = None;
            return Some(Role::Display);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let game = GameState::new();
        assert_eq!(game.phase(), Phase::Selecting);
        assert!(!game.accepts_selections());
        assert_eq!(game.admin(), None);
        assert_eq!(game.display(), None);
    }

    #[test]
    fn test_advance_cycles() {
        let mut game = GameState::new();
        assert_eq!(game.advance(), Phase::Playing);
        assert!(game.accepts_selections());
        assert_eq!(game.advance(), Phase::GameOver);
        assert!(!game.accepts_selections());
        assert_eq!(game.advance(), Phase::Selecting);
        assert_eq!(game.advance(), Phase::Playing);
    }

    #[test]
    fn test_singleton_roles_last_writer_wins() {
        let mut game = GameState::new();
        game.assign(Role::Admin, 1);
        game.assign(Role::Admin, 2);
        game.assign(Role::Display, 3);
        game.assign(Role::Player, 4);

        assert!(!game.is_admin(1));
        assert!(game.is_admin(2));
        assert_eq!(game.display(), Some(3));
    }

    #[test]
    fn test_release_roles() {
        let mut game = GameState::new();
        game.assign(Role::Admin, 1);
        game.assign(Role::Display, 2);

        assert_eq!(game.release(1), Some(Role::Admin));
        assert_eq!(game.release(1), None);
        assert_eq!(game.release(2), Some(Role::Display));
        assert_eq!(game.release(9), None);
        assert_eq!(game.admin(), None);
        assert_eq!(game.display(), None);
    }
}
