/// State machine tests for the editing coordinator
///
/// These run against the recording store, which journals every request so the
/// tests can check both what reached the store and what never did.

#[cfg(test)]
mod editing_tests {
    use crate::coordinator::{EditState, EditingCoordinator};
    use crate::form::{AuthoringMode, FormContent};
    use crate::notify::Notification;
    use crate::testing::{RecordingStore, StoreCall};
    use autotest_common::store::DefinitionStore;
    use autotest_common::types::{
        FileBlob, TaskId, TestAddress, TestContent, TestDefinition, Visibility,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn task() -> TaskId {
        TaskId::new("COMP1511", "Lab~01")
    }

    fn coordinator() -> (Arc<RecordingStore>, EditingCoordinator<RecordingStore>) {
        let store = Arc::new(RecordingStore::new());
        let coordinator = EditingCoordinator::new(store.clone(), task());
        (store, coordinator)
    }

    /// Fill the form the way a user would for a manual test
    fn draft(
        coordinator: &mut EditingCoordinator<RecordingStore>,
        name: &str,
        input: &str,
        output: &str,
        hidden: bool,
    ) {
        let form = coordinator.form_mut();
        form.name = name.to_string();
        form.hidden = hidden;
        form.set_manual_input(input).unwrap();
        form.set_manual_output(output).unwrap();
    }

    async fn create(
        coordinator: &mut EditingCoordinator<RecordingStore>,
        name: &str,
        hidden: bool,
    ) {
        draft(coordinator, name, "7", "Is prime", hidden);
        assert!(coordinator.submit_create().await, "create of {} failed", name);
        coordinator.drain_notifications();
    }

    fn hidden(name: &str) -> TestAddress {
        TestAddress::new(name, Visibility::Hidden)
    }

    fn sample(name: &str) -> TestAddress {
        TestAddress::new(name, Visibility::Sample)
    }

    /// Test: the full create -> edit -> delete walk through
    #[tokio::test]
    async fn test_prime_scenario() {
        let (store, mut coordinator) = coordinator();

        draft(&mut coordinator, "7 prime", "7", "Is prime", true);
        assert_eq!(coordinator.state(), &EditState::Creating);
        assert!(coordinator.submit_create().await);
        assert_eq!(
            store.list_names(&task(), Visibility::Hidden).await.unwrap(),
            vec!["7 prime"]
        );
        assert_eq!(
            coordinator.drain_notifications(),
            vec![Notification::Success("7 prime added as automark".to_string())]
        );

        assert!(coordinator.select_for_edit(hidden("7 prime")).await);
        assert!(matches!(coordinator.state(), EditState::EditReady { .. }));
        assert_eq!(coordinator.form().name, "7 prime");
        coordinator.form_mut().name = "5 prime".to_string();
        coordinator.form_mut().set_manual_input("5").unwrap();

        store.clear_calls();
        assert!(coordinator.confirm_edit().await);
        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            StoreCall::Update(address, definition) => {
                assert_eq!(address, &hidden("7 prime"));
                assert_eq!(definition.name, "5 prime");
                assert_eq!(
                    definition.content,
                    TestContent::Inline {
                        input: "5".to_string(),
                        output: "Is prime".to_string()
                    }
                );
            }
            other => panic!("expected an update, got {:?}", other),
        }
        assert_eq!(
            store.list_names(&task(), Visibility::Hidden).await.unwrap(),
            vec!["5 prime"]
        );
        assert_eq!(coordinator.summaries().names(Visibility::Hidden), ["5 prime"]);
        assert_eq!(
            coordinator.drain_notifications(),
            vec![Notification::Success(
                "Success: Test '7 prime' updated to '5 prime'".to_string()
            )]
        );

        assert!(coordinator.delete(hidden("5 prime")).await);
        assert!(store
            .list_names(&task(), Visibility::Hidden)
            .await
            .unwrap()
            .is_empty());
        assert!(coordinator.summaries().names(Visibility::Hidden).is_empty());
    }

    /// Test: newest test comes first in both store and cache
    #[tokio::test]
    async fn test_creation_order_is_newest_first() {
        let (store, mut coordinator) = coordinator();
        create(&mut coordinator, "A", false).await;
        create(&mut coordinator, "B", false).await;

        assert_eq!(
            store.list_names(&task(), Visibility::Sample).await.unwrap(),
            vec!["B", "A"]
        );
        assert_eq!(coordinator.summaries().names(Visibility::Sample), ["B", "A"]);
        assert_eq!(coordinator.state(), &EditState::Idle);
        assert!(coordinator.form().is_pristine());
    }

    /// Test: invalid drafts never reach the store
    #[tokio::test]
    async fn test_validation_blocks_store_calls() {
        let (store, mut coordinator) = coordinator();
        let cases: [(&str, &str, &str, &str); 6] = [
            ("", "1", "50", "Test needs a name."),
            ("   ", "1", "50", "Test needs a name."),
            ("t", "fast", "50", "Time limit should be a number."),
            ("t", "-1", "50", "Time limit should be greater than 0 seconds."),
            ("t", "1", "", "Memory limit should be a number."),
            ("t", "1", "0", "Memory limit should be greater than 0 megabytes."),
        ];

        for (name, cpu, memory, expected) in cases {
            let form = coordinator.form_mut();
            form.name = name.to_string();
            form.cpu_time_limit = cpu.to_string();
            form.memory_limit = memory.to_string();

            assert!(!coordinator.submit_create().await);
            assert_eq!(
                coordinator.drain_notifications(),
                vec![Notification::Alert(expected.to_string())]
            );
        }
        assert!(store.calls().is_empty());
        assert!(coordinator.summaries().names(Visibility::Sample).is_empty());
    }

    /// Test: a failed create keeps the draft and leaves the cache alone
    #[tokio::test]
    async fn test_rejected_create_keeps_draft() {
        let (_store, mut coordinator) = coordinator();
        create(&mut coordinator, "dup", true).await;

        draft(&mut coordinator, "dup", "1", "2", true);
        assert!(!coordinator.submit_create().await);
        assert_eq!(
            coordinator.drain_notifications(),
            vec![Notification::Alert(
                "Error adding test: Test name already exists".to_string()
            )]
        );
        assert_eq!(coordinator.state(), &EditState::Creating);
        assert_eq!(coordinator.form().name, "dup");
        assert_eq!(coordinator.summaries().names(Visibility::Hidden), ["dup"]);
    }

    /// Test: renaming keeps the cache index
    #[tokio::test]
    async fn test_edit_rename_keeps_position() {
        let (store, mut coordinator) = coordinator();
        for name in ["A", "X", "C"] {
            create(&mut coordinator, name, true).await;
        }
        assert_eq!(coordinator.summaries().names(Visibility::Hidden), ["C", "X", "A"]);

        assert!(coordinator.select_for_edit(hidden("X")).await);
        coordinator.form_mut().name = "Y".to_string();
        assert!(coordinator.confirm_edit().await);

        assert_eq!(coordinator.summaries().names(Visibility::Hidden), ["C", "Y", "A"]);
        assert_eq!(
            store.list_names(&task(), Visibility::Hidden).await.unwrap(),
            vec!["C", "Y", "A"]
        );
    }

    /// Test: changing visibility moves the test to the front of its new class
    #[tokio::test]
    async fn test_edit_reclassification() {
        let (store, mut coordinator) = coordinator();
        create(&mut coordinator, "H", true).await;
        create(&mut coordinator, "S1", false).await;
        create(&mut coordinator, "S2", false).await;

        assert!(coordinator.select_for_edit(sample("S1")).await);
        assert!(!coordinator.form().hidden);
        coordinator.form_mut().hidden = true;
        assert!(coordinator.confirm_edit().await);

        assert_eq!(coordinator.summaries().names(Visibility::Hidden), ["S1", "H"]);
        assert_eq!(coordinator.summaries().names(Visibility::Sample), ["S2"]);
        assert_eq!(
            store.read(&task(), &hidden("S1")).await.unwrap().visibility,
            Visibility::Hidden
        );
        assert!(store.read(&task(), &sample("S1")).await.is_err());
    }

    /// Test: cancel leaves store and cache untouched
    #[tokio::test]
    async fn test_cancel_is_a_no_op() {
        let (store, mut coordinator) = coordinator();
        create(&mut coordinator, "keep me", false).await;
        let store_before = store.snapshot();
        let cache_before = coordinator.summaries().clone();

        assert!(coordinator.select_for_edit(sample("keep me")).await);
        store.clear_calls();
        let form = coordinator.form_mut();
        form.name = "renamed".to_string();
        form.hidden = true;
        form.memory_limit = "512".to_string();
        coordinator.cancel_edit();

        assert!(store.calls().is_empty());
        assert_eq!(store.snapshot(), store_before);
        assert_eq!(coordinator.summaries(), &cache_before);
        assert_eq!(coordinator.state(), &EditState::Idle);
        assert!(coordinator.form().is_pristine());
    }

    /// Test: selecting an entry always edits in manual mode, even for file tests
    #[tokio::test]
    async fn test_select_forces_manual_mode() {
        let (store, mut coordinator) = coordinator();
        assert!(coordinator.toggle_mode());
        assert_eq!(coordinator.form().mode(), AuthoringMode::File);

        let form = coordinator.form_mut();
        form.name = "from files".to_string();
        form.attach_input_file(FileBlob::new("in.txt", b"11\n".to_vec()))
            .unwrap();
        form.attach_output_file(FileBlob::new("out.txt", b"Is prime\n".to_vec()))
            .unwrap();
        assert!(coordinator.submit_create().await);
        assert_eq!(coordinator.form().mode(), AuthoringMode::File);
        assert!(matches!(
            store.read(&task(), &sample("from files")).await.unwrap().content,
            TestContent::Files { .. }
        ));

        assert!(coordinator.select_for_edit(sample("from files")).await);
        assert_eq!(coordinator.form().mode(), AuthoringMode::Manual);
        assert_eq!(
            coordinator.form().content(),
            &FormContent::Manual {
                input: "11\n".to_string(),
                output: "Is prime\n".to_string()
            }
        );

        // mode is locked while staged
        assert!(!coordinator.toggle_mode());
        assert_eq!(coordinator.form().mode(), AuthoringMode::Manual);
    }

    /// Test: a failed fetch returns to idle and discards the token
    #[tokio::test]
    async fn test_failed_load_returns_to_idle() {
        let (_store, mut coordinator) = coordinator();
        assert!(!coordinator.select_for_edit(hidden("missing")).await);
        assert_eq!(coordinator.state(), &EditState::Idle);
        assert!(coordinator.state().staged().is_none());
        assert_eq!(
            coordinator.drain_notifications(),
            vec![Notification::Alert(
                "Error loading test: Test with name 'missing' not found. Aborting data fetch..."
                    .to_string()
            )]
        );
    }

    /// Test: a stale token fails remotely and keeps the edit staged
    #[tokio::test]
    async fn test_stale_token_stays_ready() {
        let (store, mut coordinator) = coordinator();
        create(&mut coordinator, "gone soon", true).await;
        assert!(coordinator.select_for_edit(hidden("gone soon")).await);
        coordinator.form_mut().runner_args = "--verbose".to_string();

        // another staff member deletes it in the meantime
        store.delete(&task(), &hidden("gone soon")).await.unwrap();
        let cache_before = coordinator.summaries().clone();

        assert!(!coordinator.confirm_edit().await);
        assert!(matches!(
            coordinator.state(),
            EditState::EditReady { address, .. } if address == &hidden("gone soon")
        ));
        assert_eq!(coordinator.form().runner_args, "--verbose");
        assert_eq!(coordinator.summaries(), &cache_before);
        assert!(coordinator.drain_notifications()[0]
            .message()
            .starts_with("Error editing test: Test with name 'gone soon' not found"));

        coordinator.cancel_edit();
        assert_eq!(coordinator.state(), &EditState::Idle);
    }

    /// Test: a failed update never mutates the cache
    #[tokio::test]
    async fn test_cache_follows_acknowledgement_only() {
        let (store, mut coordinator) = coordinator();
        create(&mut coordinator, "X", true).await;
        assert!(coordinator.select_for_edit(hidden("X")).await);
        coordinator.form_mut().name = "Y".to_string();

        store.fail("update", "network unreachable");
        assert!(!coordinator.confirm_edit().await);
        assert_eq!(coordinator.summaries().names(Visibility::Hidden), ["X"]);

        store.recover("update");
        assert!(coordinator.confirm_edit().await);
        assert_eq!(coordinator.summaries().names(Visibility::Hidden), ["Y"]);
    }

    /// Test: edit validation errors carry the edit prefix and keep the edit staged
    #[tokio::test]
    async fn test_edit_validation() {
        let (store, mut coordinator) = coordinator();
        create(&mut coordinator, "T", false).await;
        assert!(coordinator.select_for_edit(sample("T")).await);
        coordinator.form_mut().cpu_time_limit = "0".to_string();
        store.clear_calls();

        assert!(!coordinator.confirm_edit().await);
        assert!(store.calls().is_empty());
        assert_eq!(
            coordinator.drain_notifications(),
            vec![Notification::Alert(
                "Error editing test: Time limit should be greater than 0 seconds.".to_string()
            )]
        );
        assert!(matches!(coordinator.state(), EditState::EditReady { .. }));
    }

    /// Test: confirm without a staged test and create with one are both refused
    #[tokio::test]
    async fn test_mode_guards() {
        let (store, mut coordinator) = coordinator();
        assert!(!coordinator.confirm_edit().await);
        assert_eq!(coordinator.state(), &EditState::Idle);

        create(&mut coordinator, "T", false).await;
        assert!(coordinator.select_for_edit(sample("T")).await);
        store.clear_calls();
        assert!(!coordinator.submit_create().await);
        assert!(store.calls().is_empty());
        assert!(matches!(coordinator.state(), EditState::EditReady { .. }));
    }

    /// Test: deleting the staged test unstages it; deleting another does not
    #[tokio::test]
    async fn test_delete_and_staged_token() {
        let (_store, mut coordinator) = coordinator();
        create(&mut coordinator, "one", false).await;
        create(&mut coordinator, "two", false).await;

        assert!(coordinator.select_for_edit(sample("one")).await);
        assert!(coordinator.delete(sample("two")).await);
        assert_eq!(coordinator.state().staged(), Some(&sample("one")));
        assert_eq!(coordinator.form().name, "one");

        assert!(coordinator.delete(sample("one")).await);
        assert_eq!(coordinator.state(), &EditState::Idle);
        assert!(coordinator.form().is_pristine());
        assert!(coordinator.summaries().names(Visibility::Sample).is_empty());
    }

    /// Test: a rejected delete changes nothing locally
    #[tokio::test]
    async fn test_failed_delete() {
        let (_store, mut coordinator) = coordinator();
        create(&mut coordinator, "stay", true).await;
        assert!(!coordinator.delete(sample("stay")).await);
        assert_eq!(coordinator.summaries().names(Visibility::Hidden), ["stay"]);
        assert!(coordinator.drain_notifications()[0]
            .message()
            .starts_with("Error deleting test:"));
    }

    /// Test: similarly named tests in different classes never get confused
    #[tokio::test]
    async fn test_suffix_names_stay_distinct() {
        let (store, mut coordinator) = coordinator();
        create(&mut coordinator, "foo", true).await;
        create(&mut coordinator, "footrue", false).await;

        assert!(coordinator.select_for_edit(sample("footrue")).await);
        coordinator.form_mut().runner_args = "edited".to_string();
        assert!(coordinator.confirm_edit().await);

        assert_eq!(
            store.read(&task(), &sample("footrue")).await.unwrap().runner_args,
            "edited"
        );
        assert_eq!(store.read(&task(), &hidden("foo")).await.unwrap().runner_args, "");
    }

    /// Test: reload replaces local lists with the store's
    #[tokio::test]
    async fn test_reload_reconciles_with_store() {
        let (store, mut coordinator) = coordinator();
        store
            .create(
                &task(),
                &TestDefinition {
                    name: "added elsewhere".to_string(),
                    visibility: Visibility::Hidden,
                    content: TestContent::Inline {
                        input: String::new(),
                        output: String::new(),
                    },
                    runner_args: String::new(),
                    cpu_time_limit_seconds: 1.0,
                    memory_limit_megabytes: 50.0,
                },
            )
            .await
            .unwrap();
        assert!(coordinator.summaries().names(Visibility::Hidden).is_empty());

        assert!(coordinator.reload().await);
        assert_eq!(
            coordinator.summaries().names(Visibility::Hidden),
            ["added elsewhere"]
        );
    }

    /// Test: close behaves like cancel
    #[tokio::test]
    async fn test_close_discards_everything_staged() {
        let (_store, mut coordinator) = coordinator();
        create(&mut coordinator, "T", true).await;
        assert!(coordinator.select_for_edit(hidden("T")).await);
        coordinator.close();
        assert_eq!(coordinator.state(), &EditState::Idle);
        assert!(coordinator.staged_original().is_none());
        assert!(coordinator.form().is_pristine());
    }

    /// Test: an abandoned request leaves the coordinator busy until cancelled
    #[tokio::test]
    async fn test_abandoned_request_blocks_until_cancel() {
        let (store, mut coordinator) = coordinator();
        create(&mut coordinator, "X", false).await;
        assert!(coordinator.select_for_edit(sample("X")).await);
        coordinator.form_mut().name = "Y".to_string();

        store.stall("update", Duration::from_secs(5));
        let abandoned = timeout(Duration::from_millis(10), coordinator.confirm_edit()).await;
        assert!(abandoned.is_err());
        assert_eq!(
            coordinator.state(),
            &EditState::Submitting {
                address: Some(sample("X"))
            }
        );

        store.clear_calls();
        let busy = "Another request is still in flight. Cancel to start over.";
        assert!(!coordinator.delete(sample("X")).await);
        assert!(!coordinator.submit_create().await);
        assert!(!coordinator.select_for_edit(sample("X")).await);
        assert!(!coordinator.confirm_edit().await);
        assert!(!coordinator.toggle_mode());
        assert!(store.calls().is_empty());
        assert_eq!(
            coordinator.drain_notifications(),
            vec![Notification::Alert(busy.to_string()); 5]
        );
        assert_eq!(coordinator.summaries().names(Visibility::Sample), ["X"]);

        coordinator.cancel_edit();
        assert_eq!(coordinator.state(), &EditState::Idle);
        assert!(coordinator.form().is_pristine());

        store.recover("update");
        assert!(coordinator.delete(sample("X")).await);
        assert!(coordinator.summaries().names(Visibility::Sample).is_empty());
    }
}
