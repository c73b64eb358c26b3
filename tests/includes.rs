mod common;

use std::sync::Arc;

use common::{deposited, partition};
use rowstream::{
    Engine, Entity, EntityOperation, PropertyMap, Stream, StreamError, StreamWriteOptions, Value,
    ETAG_ANY,
};

fn entity(row_key: &str, label: &str) -> Arc<Entity> {
    let properties = PropertyMap::from(vec![("Label", Value::from(label))]);

    Arc::new(Entity::new(row_key).etag(ETAG_ANY).properties(properties))
}

async fn write_includes(
    includes: Vec<EntityOperation>,
) -> (rowstream::Memory, rowstream::Partition, Result<(), StreamError>) {
    let (engine, partition) = partition();

    let stream = Stream::provision(&partition).await.unwrap();

    let mut event = deposited(10);
    for include in includes {
        event = event.include(include);
    }

    let outcome = stream.write(vec![event]).await.map(|_| ());

    (engine, partition, outcome)
}

#[tokio::test]
async fn includes_commit_with_their_event() {
    let view = entity("balance-view", "after-deposit");
    let (engine, partition, outcome) =
        write_includes(vec![EntityOperation::insert_or_replace(view)]).await;

    outcome.unwrap();

    // header + event row + the include row
    assert_eq!(engine.row_count(partition.key()), 3);
}

#[tokio::test]
async fn insert_then_replace_collapses_to_one_insert() {
    let view = entity("view", "v1");
    let (engine, partition, outcome) = write_includes(vec![
        EntityOperation::insert(view.clone()),
        EntityOperation::replace(view),
    ])
    .await;

    outcome.unwrap();
    assert_eq!(engine.row_count(partition.key()), 3);
}

#[tokio::test]
async fn insert_then_delete_cancels_out() {
    let view = entity("view", "v1");
    let (engine, partition, outcome) = write_includes(vec![
        EntityOperation::insert(view.clone()),
        EntityOperation::delete(view),
    ])
    .await;

    outcome.unwrap();

    // the row was never written; only header + event remain
    assert_eq!(engine.row_count(partition.key()), 2);
}

#[tokio::test]
async fn insert_replace_delete_cancels_out() {
    let view = entity("view", "v1");
    let (engine, partition, outcome) = write_includes(vec![
        EntityOperation::insert(view.clone()),
        EntityOperation::replace(view.clone()),
        EntityOperation::delete(view),
    ])
    .await;

    outcome.unwrap();
    assert_eq!(engine.row_count(partition.key()), 2);
}

#[tokio::test]
async fn delete_then_insert_replaces_an_existing_row() {
    let (engine, partition) = partition();

    let stream = Stream::provision(&partition).await.unwrap();

    let original = entity("view", "old");
    stream
        .write(vec![deposited(5).include(EntityOperation::insert(original))])
        .await
        .unwrap();

    let fresh = entity("view", "new");
    let stream = Stream::open(&partition).await.unwrap();
    stream
        .write(vec![deposited(6)
            .include(EntityOperation::delete(fresh.clone()))
            .include(EntityOperation::insert(fresh))])
        .await
        .unwrap();

    // collapsed to a replace: the row survives with the new attributes
    let row = engine.get(partition.key(), "view").await.unwrap().unwrap();
    assert_eq!(
        row.properties.get("Label"),
        Some(&Value::String("new".to_owned()))
    );
}

#[tokio::test]
async fn insert_twice_is_an_illegal_sequence() {
    let view = entity("view", "v1");
    let (_, _, outcome) = write_includes(vec![
        EntityOperation::insert(view.clone()),
        EntityOperation::insert(view),
    ])
    .await;

    let err = outcome.unwrap_err();
    assert!(err
        .to_string()
        .contains("Insert cannot be followed by Insert"));
}

#[tokio::test]
async fn distinct_handles_for_one_row_are_an_illegal_sequence() {
    let (_, _, outcome) = write_includes(vec![
        EntityOperation::insert(entity("view", "v1")),
        EntityOperation::replace(entity("view", "v2")),
    ])
    .await;

    let err = outcome.unwrap_err();
    assert!(err
        .to_string()
        .contains("different entity instances for the same row key"));
}

#[tokio::test]
async fn operating_on_a_cancelled_row_is_an_illegal_sequence() {
    let view = entity("view", "v1");
    let (_, _, outcome) = write_includes(vec![
        EntityOperation::insert(view.clone()),
        EntityOperation::delete(view.clone()),
        EntityOperation::replace(view),
    ])
    .await;

    let err = outcome.unwrap_err();
    assert!(err.to_string().contains("cannot be applied to NULL"));
}

#[tokio::test]
async fn illegal_sequences_leave_the_partition_unchanged() {
    let view = entity("view", "v1");
    let (engine, partition, outcome) = write_includes(vec![
        EntityOperation::insert(view.clone()),
        EntityOperation::insert(view),
    ])
    .await;

    assert!(outcome.is_err());

    // header only: the rejected write never reached the backend
    assert_eq!(engine.row_count(partition.key()), 1);
    assert_eq!(Stream::open(&partition).await.unwrap().version(), 0);
}

#[tokio::test]
async fn conflicting_include_is_classified_with_its_operation() {
    let (_, partition) = partition();

    let stream = Stream::provision(&partition).await.unwrap();
    stream
        .write(vec![
            deposited(5).include(EntityOperation::insert(entity("marker", "a")))
        ])
        .await
        .unwrap();

    let stream = Stream::open(&partition).await.unwrap();
    let err = stream
        .write(vec![
            deposited(6).include(EntityOperation::insert(entity("marker", "b")))
        ])
        .await
        .unwrap_err();

    match err {
        StreamError::IncludedOperationConflict { entity, .. } => {
            assert_eq!(entity.row_key, "marker");
        }
        other => panic!("expected IncludedOperationConflict, got {other}"),
    }

    // the event of the failed write is absent as well
    assert_eq!(Stream::open(&partition).await.unwrap().version(), 1);
}

#[tokio::test]
async fn untracked_writes_pass_includes_through() {
    let (_, partition) = partition();

    let stream = Stream::provision(&partition).await.unwrap();
    let options = StreamWriteOptions {
        track_changes: false,
    };

    // two inserts against one row would normally fold; untracked they
    // reach the backend as-is and the second one is rejected there
    let view = entity("view", "v1");
    let err = stream
        .write_with(
            &options,
            vec![deposited(5)
                .include(EntityOperation::insert(view.clone()))
                .include(EntityOperation::insert(view))],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StreamError::IncludedOperationConflict { .. }
    ));
}

#[tokio::test]
async fn untracked_writes_accept_distinct_handles() {
    let (engine, partition) = partition();

    let stream = Stream::provision(&partition).await.unwrap();
    let options = StreamWriteOptions {
        track_changes: false,
    };

    stream
        .write_with(
            &options,
            vec![deposited(5)
                .include(EntityOperation::insert_or_replace(entity("view", "v1")))
                .include(EntityOperation::insert_or_replace(entity("other", "v2")))],
        )
        .await
        .unwrap();

    assert_eq!(engine.row_count(partition.key()), 4);
}
