use super::player::PlayerId;
use super::role::Role;

/// Divisor used to estimate the saboteur count when the roster is hidden.
pub const SABOTEUR_ESTIMATE_DIVISOR: usize = 3;

/// Per-game knowledge fixed at `new_game` time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    number_of_players: usize,
    player: PlayerId,
    role: Role,
    saboteur_count: usize,
    known_saboteurs: Vec<PlayerId>,
}

impl GameSession {
    /// `saboteurs` is the list the referee revealed to this player: the full
    /// roster for a saboteur, empty (or not containing `player`) otherwise.
    pub fn new(number_of_players: usize, player: PlayerId, saboteurs: &[PlayerId]) -> Self {
        let role = if saboteurs.contains(&player) {
            Role::Saboteur
        } else {
            Role::Loyal
        };
        let (saboteur_count, known_saboteurs) = match role {
            Role::Saboteur => (saboteurs.len(), saboteurs.to_vec()),
            Role::Loyal => (number_of_players / SABOTEUR_ESTIMATE_DIVISOR, Vec::new()),
        };
        Self {
            number_of_players,
            player,
            role,
            saboteur_count,
            known_saboteurs,
        }
    }

    pub fn number_of_players(&self) -> usize {
        self.number_of_players
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_saboteur(&self) -> bool {
        self.role.is_saboteur()
    }

    /// Exact when this player is a saboteur, estimated otherwise.
    pub fn saboteur_count(&self) -> usize {
        self.saboteur_count
    }

    pub fn known_saboteurs(&self) -> &[PlayerId] {
        &self.known_saboteurs
    }

    pub fn is_known_saboteur(&self, player: PlayerId) -> bool {
        self.known_saboteurs.contains(&player)
    }

    /// Known saboteurs present in `team`.
    pub fn saboteurs_on(&self, team: &[PlayerId]) -> usize {
        team.iter().filter(|p| self.is_known_saboteur(**p)).count()
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> {
        PlayerId::all(self.number_of_players)
    }

    /// Every player except this one, ascending.
    pub fn others(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players().filter(move |p| *p != self.player)
    }
}
