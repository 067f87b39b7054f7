//! End-to-end synchronization behavior against an in-memory host.

mod common;

use std::sync::Arc;

use easel_client::protocol::Command;
use easel_client::{Control, Error, Stack, Text};

use common::open_test_page;

fn adds(batch: &easel_client::protocol::PageCommandsBatchRequest) -> Vec<&Command> {
    batch
        .commands
        .iter()
        .filter(|cmd| cmd.name.as_deref() == Some("add"))
        .collect()
}

fn removes(batch: &easel_client::protocol::PageCommandsBatchRequest) -> Vec<&Command> {
    batch
        .commands
        .iter()
        .filter(|cmd| cmd.name.as_deref() == Some("remove"))
        .collect()
}

#[tokio::test]
async fn add_assigns_ids_in_traversal_order() {
    let (host, page) = open_test_page().await;

    let stack = Stack::new();
    let first = Text::new("first");
    let second = Text::new("second");
    stack.add_child(first.clone());
    stack.add_child(second.clone());
    page.add(vec![stack.clone() as Arc<dyn Control>]).await.unwrap();

    // three nodes, three minted ids, parent before children
    assert_eq!(stack.uid().as_deref(), Some("c1"));
    assert_eq!(first.uid().as_deref(), Some("c2"));
    assert_eq!(second.uid().as_deref(), Some("c3"));

    // and the index resolves each of them
    for uid in ["c1", "c2", "c3"] {
        assert!(page.get_control(uid).is_some(), "{uid} missing from index");
    }

    let batches = host.sync_batches();
    assert_eq!(batches.len(), 1);
    let add_cmds = adds(&batches[0]);
    assert_eq!(add_cmds.len(), 1);
    assert_eq!(add_cmds[0].attrs.get("to").map(String::as_str), Some("page"));
    assert_eq!(add_cmds[0].commands.len(), 3);
}

#[tokio::test]
async fn repeated_sync_without_mutation_is_a_wire_noop() {
    let (host, page) = open_test_page().await;
    page.add(vec![Text::new("once") as Arc<dyn Control>]).await.unwrap();
    assert_eq!(host.sync_batches().len(), 1);

    page.update().await.unwrap();
    page.update().await.unwrap();

    // no further batches hit the wire
    assert_eq!(host.sync_batches().len(), 1);
}

#[tokio::test]
async fn setting_an_attr_to_its_current_value_emits_nothing() {
    let (host, page) = open_test_page().await;
    let text = Text::new("stable");
    page.add(vec![text.clone() as Arc<dyn Control>]).await.unwrap();

    text.set_value("stable");
    page.update().await.unwrap();
    assert_eq!(host.sync_batches().len(), 1);

    text.set_value("changed");
    page.update().await.unwrap();
    let batches = host.sync_batches();
    assert_eq!(batches.len(), 2);
    let set = &batches[1].commands[0];
    assert_eq!(set.name.as_deref(), Some("set"));
    assert_eq!(set.values, vec![text.uid().unwrap()]);
    assert_eq!(set.attrs.get("value").map(String::as_str), Some("changed"));
}

#[tokio::test]
async fn abc_to_acd_is_one_remove_and_one_insert_at_2() {
    let (host, page) = open_test_page().await;
    let stack = Stack::new();
    let a = Text::new("a");
    let b = Text::new("b");
    let c = Text::new("c");
    stack.add_child(a.clone());
    stack.add_child(b.clone());
    stack.add_child(c.clone());
    page.add(vec![stack.clone() as Arc<dyn Control>]).await.unwrap();
    let b_uid = b.uid().unwrap();

    let d = Text::new("d");
    stack.remove_child(&(b.clone() as Arc<dyn Control>));
    stack.add_child(d.clone());
    page.update().await.unwrap();

    let batches = host.sync_batches();
    let batch = batches.last().unwrap();
    let remove_cmds = removes(batch);
    let add_cmds = adds(batch);
    assert_eq!(remove_cmds.len(), 1);
    assert_eq!(remove_cmds[0].values, vec![b_uid.clone()]);
    assert_eq!(add_cmds.len(), 1);
    assert_eq!(add_cmds[0].attrs.get("at").map(String::as_str), Some("2"));
    assert_eq!(add_cmds[0].attrs.get("to"), stack.uid().as_ref());
    // a and c were kept, not re-sent
    assert_eq!(add_cmds[0].commands.len(), 1);
    assert_eq!(batch.commands.len(), 2);

    assert!(page.get_control(&b_uid).is_none());
    assert!(page.get_control(&a.uid().unwrap()).is_some());
    assert!(page.get_control(&c.uid().unwrap()).is_some());
    assert!(page.get_control(&d.uid().unwrap()).is_some());
}

#[tokio::test]
async fn empty_to_xy_is_two_inserts_at_0_and_1() {
    let (host, page) = open_test_page().await;
    let stack = Stack::new();
    page.add(vec![stack.clone() as Arc<dyn Control>]).await.unwrap();

    stack.add_child(Text::new("x"));
    stack.add_child(Text::new("y"));
    page.update().await.unwrap();

    let batches = host.sync_batches();
    let batch = batches.last().unwrap();
    let add_cmds = adds(batch);
    assert_eq!(add_cmds.len(), 2);
    assert_eq!(add_cmds[0].attrs.get("at").map(String::as_str), Some("0"));
    assert_eq!(add_cmds[1].attrs.get("at").map(String::as_str), Some("1"));
    assert!(removes(batch).is_empty());
}

#[tokio::test]
async fn emptying_removes_both_and_scrubs_descendants_from_the_index() {
    let (host, page) = open_test_page().await;
    let stack = Stack::new();
    let a = Text::new("a");
    let inner = Stack::new();
    let deep = Text::new("deep");
    inner.add_child(deep.clone());
    stack.add_child(a.clone());
    stack.add_child(inner.clone());
    page.add(vec![stack.clone() as Arc<dyn Control>]).await.unwrap();

    let gone = [a.uid().unwrap(), inner.uid().unwrap(), deep.uid().unwrap()];
    stack.clear_children();
    page.update().await.unwrap();

    let batches = host.sync_batches();
    let batch = batches.last().unwrap();
    let remove_cmds = removes(batch);
    assert_eq!(remove_cmds.len(), 1);
    assert_eq!(remove_cmds[0].values, vec![gone[0].clone(), gone[1].clone()]);
    for uid in &gone {
        assert!(page.get_control(uid).is_none(), "{uid} still indexed");
    }
    assert!(page.get_control(&stack.uid().unwrap()).is_some());
}

#[tokio::test]
async fn removing_and_readding_restores_the_same_attribute_set() {
    let (host, page) = open_test_page().await;
    let text = Text::new("styled");
    text.set_color("teal");
    text.set_bold(true);
    page.add(vec![text.clone() as Arc<dyn Control>]).await.unwrap();
    let first_uid = text.uid().unwrap();
    let first_define = adds(&host.sync_batches()[0])[0].commands[0].clone();

    page.remove(&[text.clone() as Arc<dyn Control>]).await.unwrap();
    assert!(page.get_control(&first_uid).is_none());

    page.add(vec![text.clone() as Arc<dyn Control>]).await.unwrap();
    let batches = host.sync_batches();
    let second_define = adds(batches.last().unwrap())[0].commands[0].clone();

    assert_eq!(first_define.attrs, second_define.attrs);
    assert_eq!(first_define.values, second_define.values);
    let second_uid = text.uid().unwrap();
    assert_ne!(first_uid, second_uid);
    assert!(page.get_control(&second_uid).is_some());
}

#[tokio::test]
async fn host_error_fails_the_call_and_the_next_sync_retries() {
    let (host, page) = open_test_page().await;
    host.fail_next_batch("page quota exceeded");

    let text = Text::new("late");
    let err = page.add(vec![text.clone() as Arc<dyn Control>]).await.unwrap_err();
    match err {
        Error::Host(message) => assert_eq!(message, "page quota exceeded"),
        other => panic!("expected host error, got {other:?}"),
    }
    assert!(text.uid().is_none());

    // the baseline did not advance, so the same delta goes out again
    page.update().await.unwrap();
    assert!(text.uid().is_some());
    let batches = host.sync_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(adds(&batches[1]).len(), 1);
}

#[tokio::test]
async fn surplus_ids_are_a_protocol_fault() {
    let (host, page) = open_test_page().await;
    host.extra_uid_on_next_batch();

    let err = page.add(vec![Text::new("x") as Arc<dyn Control>]).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn updating_a_detached_control_fails_before_any_network() {
    let (host, page) = open_test_page().await;
    let batches_before = host.batches().len();

    let loose = Text::new("loose");
    let err = page
        .update_controls(&[loose as Arc<dyn Control>])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAttached));
    assert_eq!(host.batches().len(), batches_before);
}

#[tokio::test]
async fn clean_scrubs_the_page() {
    let (host, page) = open_test_page().await;
    let a = Text::new("a");
    let b = Text::new("b");
    page.add(vec![a.clone() as Arc<dyn Control>, b.clone() as Arc<dyn Control>])
        .await
        .unwrap();

    page.clean().await.unwrap();

    let cleans = host.page_commands();
    assert_eq!(cleans.len(), 1);
    assert_eq!(cleans[0].command.name.as_deref(), Some("clean"));
    assert_eq!(cleans[0].command.values, vec!["page"]);
    assert!(page.get_control(&a.uid().unwrap()).is_none());
    assert!(page.get_control(&b.uid().unwrap()).is_none());

    // nothing left to diff
    page.update().await.unwrap();
    assert_eq!(host.sync_batches().len(), 1);
}

#[tokio::test]
async fn insert_places_controls_at_the_requested_offset() {
    let (host, page) = open_test_page().await;
    let a = Text::new("a");
    let c = Text::new("c");
    page.add(vec![a.clone() as Arc<dyn Control>, c.clone() as Arc<dyn Control>])
        .await
        .unwrap();

    let b = Text::new("b");
    page.insert(1, vec![b.clone() as Arc<dyn Control>]).await.unwrap();

    let batches = host.sync_batches();
    let add_cmds = adds(batches.last().unwrap());
    assert_eq!(add_cmds.len(), 1);
    assert_eq!(add_cmds[0].attrs.get("at").map(String::as_str), Some("1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutations_never_interleave_batches() {
    let (host, page) = open_test_page().await;

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let page = page.clone();
        tasks.push(tokio::spawn(async move {
            let controls: Vec<Arc<dyn Control>> = (0..10)
                .map(|i| Text::new(&format!("row {i}")) as Arc<dyn Control>)
                .collect();
            page.add(controls).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // each call produced exactly one whole batch of ten adds
    let batches = host.sync_batches();
    assert_eq!(batches.len(), 2);
    for batch in &batches {
        assert_eq!(adds(batch).len(), 10);
    }

    // twenty distinct ids, all indexed
    let mut uids = std::collections::HashSet::new();
    for batch in &batches {
        for add in adds(batch) {
            assert_eq!(add.commands.len(), 1);
        }
    }
    for i in 1..=20 {
        let uid = format!("c{i}");
        assert!(page.get_control(&uid).is_some(), "{uid} missing");
        uids.insert(uid);
    }
    assert_eq!(uids.len(), 20);
}
