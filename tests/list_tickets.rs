pub mod common;

use helpdesk::{
    api::{
        self,
        ticket::{Edit, Filter, Priority, Sort, SortField, Status, Type},
    },
    db::{Direction, Page},
};

use self::common::{agent, Harness, CUSTOMER};

#[tokio::test]
async fn paginates_newest_first() {
    let harness = Harness::new().await;
    for _ in 0..5 {
        harness.open_ticket(Type::SiteIssue).await;
    }

    let page = harness
        .service
        .list(&Filter::default(), Page { page: 2, limit: 2 }, Sort::default())
        .await
        .unwrap();

    let numbers = page
        .items
        .iter()
        .map(|t| t.ticket_number.sequence())
        .collect::<Vec<_>>();
    assert_eq!(numbers, [3, 2]);
    assert_eq!(page.total_count, 5);
    assert_eq!(page.page_info.total_pages, 3);
    assert!(page.page_info.has_next_page);
}

#[tokio::test]
async fn last_page_has_no_next() {
    let harness = Harness::new().await;
    for _ in 0..3 {
        harness.open_ticket(Type::Branding).await;
    }

    let page = harness
        .service
        .list(
            &Filter::default(),
            Page { page: 1, limit: 3 },
            Sort {
                field: SortField::CreatedAt,
                direction: Direction::Asc,
            },
        )
        .await
        .unwrap();

    let numbers = page
        .items
        .iter()
        .map(|t| t.ticket_number.sequence())
        .collect::<Vec<_>>();
    assert_eq!(numbers, [1, 2, 3]);
    assert!(!page.page_info.has_next_page);
}

#[tokio::test]
async fn filters_by_status_priority_and_type() {
    let harness = Harness::new().await;
    let refund = harness.open_ticket(Type::RequestRefund).await;
    let site = harness.open_ticket(Type::SiteIssue).await;
    harness.open_ticket(Type::SiteIssue).await;
    harness
        .service
        .update(
            &agent(),
            site.id,
            Edit {
                status: Some(Status::Pending),
                ..Edit::default()
            },
        )
        .await
        .unwrap();

    let pending = harness
        .service
        .list(
            &Filter {
                status: Some(Status::Pending),
                ..Filter::default()
            },
            Page::default(),
            Sort::default(),
        )
        .await
        .unwrap();
    assert_eq!(pending.total_count, 1);
    assert_eq!(pending.items[0].id, site.id);

    let medium = harness
        .service
        .list(
            &Filter {
                priority: Some(Priority::Medium),
                ..Filter::default()
            },
            Page::default(),
            Sort::default(),
        )
        .await
        .unwrap();
    assert_eq!(medium.total_count, 1);
    assert_eq!(medium.items[0].id, refund.id);

    let site_issues = harness
        .service
        .list(
            &Filter {
                ticket_type: Some(Type::SiteIssue),
                ..Filter::default()
            },
            Page::default(),
            Sort::default(),
        )
        .await
        .unwrap();
    assert_eq!(site_issues.total_count, 2);
}

#[tokio::test]
async fn filters_by_assignee_and_customer() {
    let harness = Harness::new().await;
    let assigned = harness.open_ticket(Type::SiteIssue).await;
    harness.open_ticket(Type::SiteIssue).await;
    harness
        .service
        .update(
            &agent(),
            assigned.id,
            Edit {
                assignee_id: Some("bob".into()),
                ..Edit::default()
            },
        )
        .await
        .unwrap();
    harness
        .service
        .create(
            &agent(),
            api::ticket::New::new("someone-else", "S", "M", Type::Investor),
        )
        .await
        .unwrap();

    let bob = harness.user("bob").await;
    let by_bob = harness
        .service
        .list(
            &Filter {
                assignee: Some(bob.id),
                ..Filter::default()
            },
            Page::default(),
            Sort::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_bob.total_count, 1);
    assert_eq!(by_bob.items[0].id, assigned.id);

    let customer = harness.user(CUSTOMER).await;
    let by_customer = harness
        .service
        .list(
            &Filter {
                customer: Some(customer.id),
                ..Filter::default()
            },
            Page::default(),
            Sort::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_customer.total_count, 2);
}
