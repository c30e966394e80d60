use bikeshare_schema::{Bike, LIST_LIMIT};

/// Order candidates cheapest first and keep at most [`LIST_LIMIT`].
///
/// Ties on cost fall back to identifier order so repeated listings agree.
pub(crate) fn cheapest(mut candidates: Vec<Bike>) -> Vec<Bike> {
    candidates.sort_by(|a, b| {
        a.fields
            .hourly_cost
            .total_cmp(&b.fields.hourly_cost)
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.truncate(LIST_LIMIT);
    candidates
}
