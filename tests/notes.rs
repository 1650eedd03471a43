pub mod common;

use helpdesk::{
    api::{self, ticket::Type, FileRef},
    db::activity::{Kind, Metadata},
    service::{Entity, Error, Validation},
    Caller,
};

use self::common::{agent, Harness};

fn note(content: &str) -> api::note::New {
    api::note::New {
        content: content.into(),
        files: vec![],
    }
}

#[tokio::test]
async fn adds_note_with_files() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let created = harness
        .service
        .add_note(
            &agent(),
            ticket.id,
            api::note::New {
                content: "Called the customer".into(),
                files: vec![FileRef {
                    url: "call.mp3".into(),
                    file_type: "audio/mpeg".into(),
                }],
            },
        )
        .await
        .unwrap();

    assert_eq!(created.ticket, ticket.id);
    assert_eq!(created.created_by.name, common::AGENT);

    let details = harness
        .service
        .find_one_by_id(&agent(), ticket.id)
        .await
        .unwrap();
    assert_eq!(details.notes.items, [created.clone()]);
    assert_eq!(details.files.items[0].note, Some(created.id));

    let activity = &details.activities.items[0];
    assert_eq!(activity.kind, Kind::NoteCreated);
    assert_eq!(activity.metadata, Metadata::NoteCreated { note_id: created.id });
}

#[tokio::test]
async fn updates_content_once() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;
    let created = harness
        .service
        .add_note(&agent(), ticket.id, note("draft"))
        .await
        .unwrap();

    let updated = harness
        .service
        .update_note(
            &agent(),
            created.id,
            api::note::Edit {
                content: "final".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.content, "final");

    let unchanged = harness
        .service
        .update_note(
            &agent(),
            created.id,
            api::note::Edit {
                content: "final".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(unchanged, updated);

    let kinds = harness
        .activities(ticket.id)
        .await
        .into_iter()
        .map(|a| a.kind)
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        [Kind::NoteUpdated, Kind::NoteCreated, Kind::TicketCreated],
    );
}

#[tokio::test]
async fn deleted_note_is_gone() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;
    let created = harness
        .service
        .add_note(&agent(), ticket.id, note("oops"))
        .await
        .unwrap();

    harness.service.delete_note(&agent(), created.id).await.unwrap();

    let details = harness
        .service
        .find_one_by_id(&agent(), ticket.id)
        .await
        .unwrap();
    assert!(details.notes.items.is_empty());
    assert_eq!(details.activities.items[0].kind, Kind::NoteDeleted);

    let err = harness
        .service
        .delete_note(&agent(), created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(Entity::Note)));
}

#[tokio::test]
async fn note_requires_live_ticket() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;
    harness.service.soft_delete(&agent(), ticket.id).await.unwrap();

    let err = harness
        .service
        .add_note(&agent(), ticket.id, note("late"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(Entity::Ticket)));
}

#[tokio::test]
async fn notes_of_deleted_ticket_are_frozen() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;
    let created = harness
        .service
        .add_note(&agent(), ticket.id, note("before"))
        .await
        .unwrap();
    harness.service.soft_delete(&agent(), ticket.id).await.unwrap();
    let before = harness.activities(ticket.id).await.len();

    let err = harness
        .service
        .update_note(
            &agent(),
            created.id,
            api::note::Edit {
                content: "after".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(Entity::Ticket)));

    let err = harness
        .service
        .delete_note(&agent(), created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(Entity::Ticket)));

    assert_eq!(harness.activities(ticket.id).await.len(), before);
}

#[tokio::test]
async fn rejects_blank_content_and_anonymous_callers() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let err = harness
        .service
        .add_note(&agent(), ticket.id, note("   "))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(Validation::EmptyField("content")),
    ));

    let err = harness
        .service
        .add_note(&Caller::anonymous(), ticket.id, note("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated));
}
