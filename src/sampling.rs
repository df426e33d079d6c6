//! Client roster and per-round participant sampling.
//!
//! The roster fixes the compromised subset once, at startup. Each round then
//! draws participants without replacement from one explicit seeded
//! generator, so two runs with the same seed and configuration select the
//! same clients in the same order.

use rand::rngs::StdRng;
use rand::seq::index;

use crate::error::FlError;

/// Fixed set of client identifiers `[0, num_clients)` with a compromised
/// subset chosen once at startup.
#[derive(Clone, Debug)]
pub struct ClientRoster {
    num_clients: usize,
    compromised: Vec<bool>,
}

impl ClientRoster {
    /// Build a roster of `num_clients` clients, marking
    /// `floor(c_frac * num_clients)` of them compromised via a seeded draw
    /// without replacement.
    pub fn new(num_clients: usize, c_frac: f64, rng: &mut StdRng) -> Self {
        let mut compromised = vec![false; num_clients];
        let n_bad = (c_frac * num_clients as f64).floor() as usize;
        if n_bad > 0 {
            for idx in index::sample(rng, num_clients, n_bad.min(num_clients)) {
                compromised[idx] = true;
            }
        }
        Self {
            num_clients,
            compromised,
        }
    }

    /// Total population size.
    pub fn num_clients(&self) -> usize {
        self.num_clients
    }

    /// Whether a client id is in the fixed compromised subset.
    pub fn is_compromised(&self, id: usize) -> bool {
        self.compromised.get(id).copied().unwrap_or(false)
    }

    /// Ids of all compromised clients.
    pub fn compromised_ids(&self) -> Vec<usize> {
        self.compromised
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Participants of one round plus the byzantine bound the controller will
/// hand to the aggregator.
#[derive(Clone, Debug)]
pub struct RoundSelection {
    /// Selected client ids, in draw order.
    pub participants: Vec<usize>,
    /// Nominal bound `floor(c_frac * selected_count)`. This is what the
    /// aggregator is invoked with; it is not recomputed from the draw.
    pub nominal_bound: usize,
    /// How many selected ids actually fall in the fixed compromised subset.
    pub realized_compromised: usize,
}

/// Draw one round's participants without replacement.
///
/// `selected_count = max(floor(frac * num_clients), 1)`.
pub fn draw_round(
    roster: &ClientRoster,
    frac: f64,
    c_frac: f64,
    rng: &mut StdRng,
) -> Result<RoundSelection, FlError> {
    let n = roster.num_clients();
    if n == 0 {
        return Err(FlError::EmptyUpdates);
    }
    let selected_count = ((frac * n as f64).floor() as usize).max(1).min(n);
    let participants: Vec<usize> = index::sample(rng, n, selected_count).into_iter().collect();

    let nominal_bound = (c_frac * selected_count as f64).floor() as usize;
    let realized_compromised = participants
        .iter()
        .filter(|&&id| roster.is_compromised(id))
        .count();

    Ok(RoundSelection {
        participants,
        nominal_bound,
        realized_compromised,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_selected_count_floor_with_minimum_one() {
        let mut rng = StdRng::seed_from_u64(7);
        let roster = ClientRoster::new(10, 0.0, &mut rng);
        let sel = draw_round(&roster, 0.05, 0.0, &mut rng).unwrap();
        assert_eq!(sel.participants.len(), 1);
    }

    #[test]
    fn test_selected_count_matches_frac() {
        let mut rng = StdRng::seed_from_u64(7);
        let roster = ClientRoster::new(10, 0.3, &mut rng);
        let sel = draw_round(&roster, 0.5, 0.3, &mut rng).unwrap();
        assert_eq!(sel.participants.len(), 5);
        assert_eq!(sel.nominal_bound, 1); // floor(0.3 * 5)
    }

    #[test]
    fn test_draw_without_replacement() {
        let mut rng = StdRng::seed_from_u64(3);
        let roster = ClientRoster::new(20, 0.0, &mut rng);
        let sel = draw_round(&roster, 0.8, 0.0, &mut rng).unwrap();
        let mut ids = sel.participants.clone();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), sel.participants.len());
        assert!(ids.iter().all(|&id| id < 20));
    }

    #[test]
    fn test_same_seed_same_selection() {
        let draw = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            let roster = ClientRoster::new(30, 0.2, &mut rng);
            let a = draw_round(&roster, 0.4, 0.2, &mut rng).unwrap();
            let b = draw_round(&roster, 0.4, 0.2, &mut rng).unwrap();
            (roster.compromised_ids(), a.participants, b.participants)
        };
        assert_eq!(draw(99), draw(99));
    }

    #[test]
    fn test_roster_compromised_count_fixed_at_startup() {
        let mut rng = StdRng::seed_from_u64(11);
        let roster = ClientRoster::new(10, 0.3, &mut rng);
        assert_eq!(roster.compromised_ids().len(), 3);

        // Realized count per round is the intersection with the fixed set,
        // not an independent draw.
        for _ in 0..5 {
            let sel = draw_round(&roster, 0.5, 0.3, &mut rng).unwrap();
            let recount = sel
                .participants
                .iter()
                .filter(|&&id| roster.is_compromised(id))
                .count();
            assert_eq!(sel.realized_compromised, recount);
        }
    }
}
