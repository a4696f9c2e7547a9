// Tests for the economy core that need no live infrastructure.

#[cfg(test)]
mod tests {
    use actix_web::error::ResponseError;
    use actix_web::http::StatusCode;
    use workshop_backend::auth::invite_reward_plan;
    use workshop_backend::errors::WorkshopError;
    use workshop_backend::models::TransactionCategory;
    use workshop_backend::progression::{level_for_lightning, LEVEL_THRESHOLDS};
    use workshop_backend::storage::avatar_object_key;

    #[test]
    fn test_threshold_table_is_ascending() {
        for window in LEVEL_THRESHOLDS.windows(2) {
            assert!(window[0] <= window[1]);
        }
    }

    #[test]
    fn test_level_consistent_with_thresholds_everywhere() {
        for lightning in [0, 1, 299, 300, 1499, 1500, 29_999, 30_000, 100_000] {
            let level = level_for_lightning(lightning) as usize;
            assert!(lightning >= LEVEL_THRESHOLDS[level]);
            if level + 1 < LEVEL_THRESHOLDS.len() {
                assert!(lightning < LEVEL_THRESHOLDS[level + 1]);
            }
        }
    }

    #[test]
    fn test_invite_reward_plan_row_shape() {
        let invitee_id = 7;
        let inviter_id = 3;
        let rows = invite_reward_plan(invitee_id, inviter_id);

        assert_eq!(rows.len(), 3);

        let invitee_total = rows
            .iter()
            .filter(|row| row.user_id == invitee_id)
            .fold((0, 0), |acc, row| (acc.0 + row.drops, acc.1 + row.lightning));
        assert_eq!(invitee_total, (20, 0));

        // The inviter's drops and lightning land as two separate entries,
        // each moving exactly one currency.
        let inviter_rows: Vec<_> = rows.iter().filter(|row| row.user_id == inviter_id).collect();
        assert_eq!(inviter_rows.len(), 2);
        for row in &inviter_rows {
            assert!((row.drops > 0) != (row.lightning > 0));
        }
        let inviter_total = inviter_rows
            .iter()
            .fold((0, 0), |acc, row| (acc.0 + row.drops, acc.1 + row.lightning));
        assert_eq!(inviter_total, (10, 10));

        // Every entry names the other party as counterparty.
        for row in &rows {
            let expected = if row.user_id == invitee_id { inviter_id } else { invitee_id };
            assert_eq!(row.counterparty, expected);
        }
    }

    #[test]
    fn test_category_wire_format() {
        assert_eq!(
            serde_json::to_string(&TransactionCategory::Checkin).unwrap(),
            "\"CHECKIN\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionCategory::MapDownloadPay).unwrap(),
            "\"MAP_DOWNLOAD_PAY\""
        );
        let parsed: TransactionCategory = serde_json::from_str("\"INVITE\"").unwrap();
        assert_eq!(parsed, TransactionCategory::Invite);
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            WorkshopError::UserNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WorkshopError::Conflict("Already checked in today".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            WorkshopError::InsufficientFunds {
                required: 10,
                available: 3
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WorkshopError::InvalidInviteCode.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WorkshopError::Unauthorized("bad credentials".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_error_envelope_shape() {
        let response = WorkshopError::InvalidInviteCode.error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_insufficient_funds_message_carries_amounts() {
        let err = WorkshopError::InsufficientFunds {
            required: 25,
            available: 7,
        };
        let message = err.to_string();
        assert!(message.contains("25"));
        assert!(message.contains("7"));
    }

    #[test]
    fn test_avatar_keys_are_distinct_over_time() {
        let first = avatar_object_key("cartographer", 3, 1_700_000_000, "png");
        let second = avatar_object_key("cartographer", 3, 1_700_000_060, "png");
        assert_ne!(first, second);
        assert!(first.starts_with("avatars/"));
    }
}
