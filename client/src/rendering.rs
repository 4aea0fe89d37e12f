use crate::game::ClientGameState;
use shared::{Continent, GameData, Territory};
use std::fmt::Write;

/// Text board: every territory grouped by continent, then the players and
/// the local hand, then what to do next
pub fn render_board(state: &ClientGameState) -> String {
    let mut out = String::new();
    let game = match state.game() {
        Some(game) => game,
        None => return state.status_line(),
    };

    for continent in Continent::all() {
        let _ = writeln!(
            out,
            "== {} (+{}) ==",
            continent.name(),
            continent.army_bonus()
        );
        for territory in Territory::all().filter(|t| continent.mask() & t.mask() != 0) {
            let _ = writeln!(out, "{}", territory_line(state, game, territory));
        }
    }

    out.push('\n');
    out.push_str(&render_standings(state, game));

    if let Some(me) = state.my_data() {
        if let Ok(cards) = me.cards() {
            let names: Vec<String> = cards.iter().map(ToString::to_string).collect();
            let hand = if names.is_empty() {
                "none".to_string()
            } else {
                names.join(", ")
            };
            let _ = writeln!(out, "Your cards: {}", hand);
        }
    }
    let _ = writeln!(out, "Cards left in deck: {}", game.cards_in_deck_estimate());

    out.push_str(&state.status_line());
    out
}

fn territory_line(state: &ClientGameState, game: &GameData, territory: Territory) -> String {
    let owner = match game.territory_owner(territory) {
        Some(id) => state.player_name(id),
        None => "-".to_string(),
    };
    format!(
        "{:>3} {:<22} {:<16} {:>4}",
        territory.id(),
        territory.name(),
        owner,
        game.territory_armies(territory)
    )
}

fn render_standings(state: &ClientGameState, game: &GameData) -> String {
    let mut out = String::new();
    for player in game.players() {
        let marker = if game.is_current_player(player.id()) {
            '>'
        } else {
            ' '
        };
        let _ = writeln!(
            out,
            "{} {:<16} territories {:>2}  free armies {:>3}  cards {}",
            marker,
            state.player_name(player.id()),
            player.territory_count(),
            player.free_armies(),
            player.card_count()
        );
    }
    out
}

/// The lobby list, one player per line
pub fn render_players(state: &ClientGameState) -> String {
    let mut out = String::from("Players:");
    for (id, name) in state.players() {
        let you = if state.my_id() == Some(*id) {
            " (you)"
        } else {
            ""
        };
        let _ = write!(out, "\n  {:>2} {}{}", id, name, you);
    }
    out
}
