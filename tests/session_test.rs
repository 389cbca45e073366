//! Integration tests for session management

mod test_utils;

#[cfg(test)]
mod tests {
    use parley::chat::{
        NewMessage, Session, append_message, create_session, delete_session, find_session,
        find_session_by_name, list_sessions, load_history, rename_session,
    };
    use parley::core::ChatError;

    use crate::test_utils::test_db;

    #[tokio::test]
    async fn it_creates_sessions_with_distinct_ids() {
        let (_dir, db) = test_db().await;

        let a = create_session(&db, "A").await.unwrap();
        let b = create_session(&db, "B").await.unwrap();

        assert_ne!(a, b);
        assert!(b > a);
    }

    #[tokio::test]
    async fn it_rejects_duplicate_session_names() {
        let (_dir, db) = test_db().await;

        create_session(&db, "A").await.unwrap();
        let result = create_session(&db, "A").await;

        assert!(matches!(result, Err(ChatError::DuplicateSessionName(ref name)) if name == "A"));
        let sessions = list_sessions(&db).await.unwrap();
        assert_eq!(sessions.iter().filter(|s| s.name == "A").count(), 1);
    }

    #[tokio::test]
    async fn it_matches_names_case_sensitively() {
        let (_dir, db) = test_db().await;

        create_session(&db, "Work").await.unwrap();
        create_session(&db, "work").await.unwrap();

        assert_eq!(list_sessions(&db).await.unwrap().len(), 2);
    }

    /// Concurrent creators racing on the same name must not both pass
    /// the uniqueness check
    #[tokio::test]
    async fn it_serializes_concurrent_creates_with_the_same_name() {
        let (_dir, db) = test_db().await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { create_session(&db, "Race").await })
            })
            .collect();

        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(ChatError::DuplicateSessionName(_)) => duplicates += 1,
                Err(e) => panic!("Unexpected error: {}", e),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(list_sessions(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn it_lists_sessions_newest_first() {
        let (_dir, db) = test_db().await;

        let first = create_session(&db, "first").await.unwrap();
        let second = create_session(&db, "second").await.unwrap();
        let third = create_session(&db, "third").await.unwrap();

        let sessions = list_sessions(&db).await.unwrap();
        assert_eq!(
            sessions,
            vec![
                Session {
                    id: third,
                    name: "third".to_string()
                },
                Session {
                    id: second,
                    name: "second".to_string()
                },
                Session {
                    id: first,
                    name: "first".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn it_lists_nothing_for_an_empty_store() {
        let (_dir, db) = test_db().await;
        assert!(list_sessions(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn it_renames_in_place() {
        let (_dir, db) = test_db().await;

        let id = create_session(&db, "Draft").await.unwrap();
        append_message(&db, id, &NewMessage::user("keep me"))
            .await
            .unwrap();
        rename_session(&db, id, "Final").await.unwrap();

        let session = find_session(&db, id).await.unwrap().unwrap();
        assert_eq!(session.name, "Final");
        assert_eq!(load_history(&db, id).await.unwrap().len(), 1);
    }

    /// Rename does not re-check uniqueness, so two sessions can end up
    /// with the same name
    #[tokio::test]
    async fn it_allows_renaming_to_an_existing_name() {
        let (_dir, db) = test_db().await;

        let a = create_session(&db, "A").await.unwrap();
        let b = create_session(&db, "B").await.unwrap();
        rename_session(&db, b, "A").await.unwrap();

        let sessions = list_sessions(&db).await.unwrap();
        assert_eq!(sessions.iter().filter(|s| s.name == "A").count(), 2);

        // Lookup by name resolves to the newest match
        let found = find_session_by_name(&db, "A").await.unwrap().unwrap();
        assert_eq!(found.id, b);
        assert_ne!(found.id, a);

        // Creation still refuses the duplicate
        assert!(matches!(
            create_session(&db, "A").await,
            Err(ChatError::DuplicateSessionName(_))
        ));
    }

    #[tokio::test]
    async fn it_deletes_sessions_and_their_messages() {
        let (_dir, db) = test_db().await;

        let keep = create_session(&db, "keep").await.unwrap();
        let doomed = create_session(&db, "doomed").await.unwrap();
        for content in ["one", "two", "three"] {
            append_message(&db, doomed, &NewMessage::user(content))
                .await
                .unwrap();
        }
        append_message(&db, keep, &NewMessage::user("still here"))
            .await
            .unwrap();

        delete_session(&db, doomed).await.unwrap();

        let sessions = list_sessions(&db).await.unwrap();
        assert!(sessions.iter().all(|s| s.id != doomed));
        assert!(find_session(&db, doomed).await.unwrap().is_none());
        assert!(load_history(&db, doomed).await.unwrap().is_empty());
        assert_eq!(load_history(&db, keep).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn it_never_reuses_deleted_ids() {
        let (_dir, db) = test_db().await;

        let first = create_session(&db, "first").await.unwrap();
        delete_session(&db, first).await.unwrap();
        let second = create_session(&db, "first").await.unwrap();

        assert!(second > first);
        assert!(load_history(&db, second).await.unwrap().is_empty());
    }
}
