#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use crate::types::Money;
    use crate::wire::{PaymentErrorCode, PaymentRequest, PaymentResponse};

    proptest! {
        #[test]
        fn money_checked_sub_never_underflows(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let result = Money(a).checked_sub(Money(b));
            if a >= b {
                prop_assert_eq!(result, Some(Money(a - b)));
            } else {
                prop_assert_eq!(result, None);
            }
        }

        #[test]
        fn payment_response_round_trips(id_seed in any::<u128>(), balance in 0u64..1_000_000_000) {
            let response = PaymentResponse {
                transaction_id: crate::types::TransactionId(uuid::Uuid::from_u128(id_seed)),
                balance_after: Money(balance),
            };
            let json = serde_json::to_string(&response).unwrap();
            let decoded: PaymentResponse = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(decoded.transaction_id.0, response.transaction_id.0);
            prop_assert_eq!(decoded.balance_after, response.balance_after);
        }
    }

    #[test]
    fn payment_request_round_trips_with_product_items() {
        let request = PaymentRequest {
            id: crate::types::TransactionId::new(),
            wallet_id: crate::types::WalletId::new(),
            amount: Money(500),
            tx_type: crate::types::TransactionType::Purchase,
            stand_id: Some(crate::types::StandId::new()),
            product_items: vec![crate::wire::WireProductItem {
                product_id: crate::types::ProductId::new(),
                quantity: 2,
                unit_price: Money(250),
            }],
            idempotency_key: "idem-1".into(),
            offline_signature: "deadbeef".into(),
            device_id: crate::types::DeviceId::new(),
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&request).unwrap();
        let decoded: PaymentRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.idempotency_key, request.idempotency_key);
        assert_eq!(decoded.product_items.len(), 1);
        assert_eq!(decoded.product_items[0].quantity, 2);
    }

    #[test]
    fn unknown_error_code_is_rejected() {
        let err = serde_json::from_str::<PaymentErrorCode>("\"NOT_A_REAL_CODE\"");
        assert!(err.is_err());
    }
}
