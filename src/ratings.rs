use dashmap::DashMap;
use ulid::Ulid;

/// Secondary ranking signal supplied by the review store. The engine only reads it.
pub trait RatingSource: Send + Sync {
    fn rating(&self, activity_id: &Ulid) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    stars: u64,
    count: u64,
}

/// In-memory mean of 1..=5 star reviews per activity.
#[derive(Default)]
pub struct ReviewRatings {
    tallies: DashMap<Ulid, Tally>,
}

impl ReviewRatings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false (and records nothing) for stars outside 1..=5.
    pub fn add_review(&self, activity_id: Ulid, stars: u8) -> bool {
        if !(1..=5).contains(&stars) {
            return false;
        }
        let mut tally = self.tallies.entry(activity_id).or_default();
        tally.stars += u64::from(stars);
        tally.count += 1;
        true
    }

    pub fn review_count(&self, activity_id: &Ulid) -> u64 {
        self.tallies.get(activity_id).map_or(0, |t| t.count)
    }
}

impl RatingSource for ReviewRatings {
    fn rating(&self, activity_id: &Ulid) -> Option<f64> {
        let tally = self.tallies.get(activity_id)?;
        (tally.count > 0).then(|| tally.stars as f64 / tally.count as f64)
    }
}
