pub mod common;

use helpdesk::{
    api::{self, ticket::Type, FileRef},
    db::activity::Kind,
    service::{Entity, Error, Settings},
};

use self::common::{agent, Fixture, Harness};

#[tokio::test]
async fn embeds_newest_entries_up_to_cap() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    for i in 1..=5 {
        harness
            .service
            .add_note(
                &agent(),
                ticket.id,
                api::note::New {
                    content: format!("note {i}"),
                    files: vec![],
                },
            )
            .await
            .unwrap();
    }
    for i in 1..=2 {
        harness
            .service
            .add_task(
                &agent(),
                ticket.id,
                api::task::New {
                    title: format!("task {i}"),
                    due_date: None,
                },
            )
            .await
            .unwrap();
    }

    let details = harness
        .service
        .find_one_by_id(&agent(), ticket.id)
        .await
        .unwrap();

    assert_eq!(details.ticket, ticket);
    let notes = details
        .notes
        .items
        .iter()
        .map(|n| n.content.as_str())
        .collect::<Vec<_>>();
    assert_eq!(notes, ["note 5", "note 4", "note 3"]);
    assert!(details.notes.has_more);

    assert_eq!(details.tasks.items.len(), 2);
    assert!(!details.tasks.has_more);

    // 1 creation + 5 notes + 2 tasks
    assert_eq!(details.activities.items.len(), 3);
    assert!(details.activities.has_more);
    assert_eq!(details.activities.items[0].kind, Kind::TaskCreated);
}

#[tokio::test]
async fn cap_follows_settings() {
    let harness = Fixture::new()
        .settings(Settings {
            display_cap: 1,
            ..Settings::default()
        })
        .build()
        .await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let details = harness
        .service
        .find_one_by_id(&agent(), ticket.id)
        .await
        .unwrap();

    assert_eq!(details.activities.items.len(), 1);
    assert!(!details.activities.has_more);
}

#[tokio::test]
async fn unavailable_file_service_yields_no_files() {
    let harness = Fixture::new().unavailable_files().build().await;

    let mut input =
        api::ticket::New::new(common::CUSTOMER, "S", "M", Type::SiteIssue);
    input.files = vec![FileRef {
        url: "a.pdf".into(),
        file_type: "application/pdf".into(),
    }];
    let ticket = harness.service.create(&agent(), input).await.unwrap();
    let details = harness
        .service
        .find_one_by_id(&agent(), ticket.id)
        .await
        .unwrap();

    assert!(details.files.items.is_empty());
    assert!(!details.files.has_more);
}

#[tokio::test]
async fn unknown_ticket_is_not_found() {
    let harness = Harness::new().await;

    let err = harness
        .service
        .find_one_by_id(&agent(), api::ticket::Id::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(Entity::Ticket)));
}

#[tokio::test]
async fn finds_by_number() {
    let harness = Harness::new().await;
    harness.open_ticket(Type::Branding).await;
    let second = harness.open_ticket(Type::Branding).await;

    let found = harness
        .service
        .find_by_number(&"#BR-000002".parse().unwrap())
        .await
        .unwrap();

    assert_eq!(found.id, second.id);

    let err = harness
        .service
        .find_by_number(&"#BR-000003".parse().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(Entity::Ticket)));
}
