//! Concurrent toggles on one subject through independent connections to the
//! same database file.

use std::path::PathBuf;
use std::sync::Arc;

use catbase_core::Subject;
use catbase_core::engagement::EngagementEngine;
use catbase_db::Database;
use catbase_db::models::NewCat;
use catbase_types::models::ReactionKind;

const ACTORS: usize = 8;
const TOGGLES_PER_ACTOR: usize = 25;
const SAME_USER_THREADS: usize = 6;
const SAME_USER_TOGGLES: usize = 40;

struct TempDb(PathBuf);

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.0.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

fn temp_db() -> TempDb {
    TempDb(std::env::temp_dir().join(format!("catbase-stress-{}.db", uuid::Uuid::new_v4())))
}

/// Users and one cat in a fresh file database.
fn seed(tmp: &TempDb, users: usize) -> (Database, Vec<i64>, i64) {
    let setup = Database::open(&tmp.0).unwrap();
    let users: Vec<i64> = (0..users)
        .map(|i| setup.create_user(&format!("racer{i}"), &format!("racer{i}@example.com"), "hash").unwrap())
        .collect();
    let cat = setup
        .insert_cat(&NewCat {
            name: "Abyssinian",
            origin: "Ethiopia",
            description: "",
            care_instructions: "",
            image_url: None,
            created_by: users[0],
        })
        .unwrap();
    (setup, users, cat)
}

/// One connection per engine, opened up front so migrations never overlap.
fn open_engines(tmp: &TempDb, count: usize) -> Vec<EngagementEngine> {
    (0..count)
        .map(|_| EngagementEngine::new(Arc::new(Database::open(&tmp.0).unwrap())))
        .collect()
}

#[test]
fn counters_match_rows_under_contention() {
    let tmp = temp_db();
    let (setup, users, cat) = seed(&tmp, ACTORS);
    let subject = Subject::Cat(cat);
    let engines = open_engines(&tmp, ACTORS);

    std::thread::scope(|scope| {
        for (i, engine) in engines.iter().enumerate() {
            let user = users[i];
            scope.spawn(move || {
                for step in 0..TOGGLES_PER_ACTOR {
                    let kind = if (i + step) % 3 == 0 {
                        ReactionKind::Dislike
                    } else {
                        ReactionKind::Like
                    };
                    engine.toggle(subject, user, kind).unwrap();
                }
            });
        }
    });

    let summary = engines[0].summary(subject, None).unwrap();
    let likes = setup.count_reaction_rows(subject, ReactionKind::Like).unwrap();
    let dislikes = setup.count_reaction_rows(subject, ReactionKind::Dislike).unwrap();
    assert_eq!(summary.like_count, likes);
    assert_eq!(summary.dislike_count, dislikes);
    assert!(likes + dislikes <= ACTORS as i64);

    for &user in &users {
        let mine = setup
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM cat_reactions WHERE cat_id = ?1 AND user_id = ?2",
                    (cat, user),
                    |row| row.get::<_, i64>(0),
                )?)
            })
            .unwrap();
        assert!(mine <= 1);
    }
}

#[test]
fn same_user_on_many_connections_keeps_one_row() {
    let tmp = temp_db();
    let (setup, users, cat) = seed(&tmp, 1);
    let user = users[0];
    let subject = Subject::Cat(cat);
    let engines = open_engines(&tmp, SAME_USER_THREADS);

    std::thread::scope(|scope| {
        for (i, engine) in engines.iter().enumerate() {
            scope.spawn(move || {
                for step in 0..SAME_USER_TOGGLES {
                    let kind = if (i * 7 + step) % 2 == 0 {
                        ReactionKind::Like
                    } else {
                        ReactionKind::Dislike
                    };
                    let summary = engine.toggle(subject, user, kind).unwrap();
                    assert!(summary.like_count + summary.dislike_count <= 1);
                }
            });
        }
    });

    let summary = engines[0].summary(subject, Some(user)).unwrap();
    let likes = setup.count_reaction_rows(subject, ReactionKind::Like).unwrap();
    let dislikes = setup.count_reaction_rows(subject, ReactionKind::Dislike).unwrap();
    assert_eq!(summary.like_count, likes);
    assert_eq!(summary.dislike_count, dislikes);
    assert!(likes + dislikes <= 1);
    assert_eq!(summary.user_reaction.is_some(), likes + dislikes == 1);
}
