use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::ProductRequest;

/// Moves every active request whose bidding window has elapsed to `expired`.
/// Returns the ids that changed.
pub fn expire_due<'a, I>(requests: I, now: DateTime<Utc>) -> Vec<Uuid>
where
    I: IntoIterator<Item = &'a mut ProductRequest>,
{
    let mut expired = Vec::new();
    for request in requests {
        if request.is_due_for_expiry(now) {
            request.expire(now);
            expired.push(request.id);
        }
    }
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRequest, RequestStatus};
    use chrono::Duration;

    fn request_with_window(hours: i32, now: DateTime<Utc>) -> ProductRequest {
        ProductRequest::new(
            Uuid::new_v4(),
            NewRequest {
                title: "Bike pump".to_string(),
                description: None,
                category: "Sports".to_string(),
                quantity: 1,
                search_radius_miles: 10,
                budget_min: None,
                budget_max: None,
                bid_duration_hours: hours,
                photos: vec![],
                latitude: None,
                longitude: None,
            },
            now,
        )
    }

    #[test]
    fn test_expire_due_only_touches_elapsed_active_requests() {
        let created = Utc::now() - Duration::hours(3);
        let mut short = request_with_window(2, created);
        let mut long = request_with_window(24, created);
        let mut closed = request_with_window(2, created);
        closed.close_with(Uuid::new_v4(), created);

        let now = Utc::now();
        let expired = expire_due([&mut short, &mut long, &mut closed], now);

        assert_eq!(expired, vec![short.id]);
        assert_eq!(short.status, RequestStatus::Expired);
        assert_eq!(long.status, RequestStatus::Active);
        assert_eq!(closed.status, RequestStatus::Closed);
    }
}
