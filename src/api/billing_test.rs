use super::*;

#[test]
fn empty_query_has_no_pairs() {
    assert!(InvoiceQuery::default().to_pairs().is_empty());
}

#[test]
fn query_includes_set_fields_in_order() {
    let query = InvoiceQuery {
        page: Some(2),
        limit: Some(10),
        starting_after: Some("in_123".into()),
        ending_before: None,
    };
    assert_eq!(
        query.to_pairs(),
        vec![("page", "2".to_owned()), ("limit", "10".to_owned()), ("startingAfter", "in_123".to_owned())]
    );
}

#[test]
fn query_skips_empty_cursor_and_keeps_raw_values() {
    let query = InvoiceQuery {
        page: None,
        limit: None,
        starting_after: Some(String::new()),
        ending_before: Some("in 1/2".into()),
    };
    assert_eq!(query.to_pairs(), vec![("endingBefore", "in 1/2".to_owned())]);
}

#[test]
fn invoices_page_deserializes_backend_shape() {
    let json = serde_json::json!({
        "data": [{
            "id": "in_1",
            "number": "A-0001",
            "amount": 4999,
            "currency": "pln",
            "status": "paid",
            "created": 1_709_600_000,
            "description": "Monthly plan",
            "invoicePdf": "https://pay.example.test/in_1.pdf",
            "paidAt": 1_709_600_100
        }, {
            "id": "in_2",
            "number": "A-0002",
            "amount": 4999,
            "currency": "pln",
            "status": "uncollectible",
            "created": 1_712_000_000
        }],
        "pagination": {
            "page": 1, "limit": 10, "hasNextPage": false, "hasPreviousPage": false,
            "nextPage": null, "previousPage": null
        }
    });
    let page: InvoicesPage = serde_json::from_value(json).unwrap();
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].status, InvoiceStatus::Paid);
    assert_eq!(page.data[0].document_url(), Some("https://pay.example.test/in_1.pdf"));
    assert_eq!(page.data[1].status, InvoiceStatus::Other);
    assert!(page.data[1].document_url().is_none());
    assert!(!page.pagination.has_next_page);
    assert!(page.pagination.next_cursor.is_none());
}

#[test]
fn portal_session_reads_portal_url() {
    let session: PortalSession =
        serde_json::from_str(r#"{"portalUrl":"https://billing.example.test/p/session"}"#).unwrap();
    assert_eq!(session.portal_url, "https://billing.example.test/p/session");
}
