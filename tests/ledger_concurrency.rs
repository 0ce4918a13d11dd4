use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use sales_ledger::{
    read_records, Amount, BotAdapter, Grammar, Ledger, Record, Source, StorageError,
};
use tempfile::tempdir;

fn sale(n: usize, source: Source) -> Record {
    let line = format!("Item-{}, {}, 100", n, n + 1);
    Grammar::ItemQtyPrice.parse(&line, source).unwrap()
}

#[test]
fn concurrent_appends_lose_nothing() {
    const THREADS: usize = 10;
    const PER_THREAD: usize = 10;

    let dir = tempdir().unwrap();
    let path = dir.path().join("sales.json");
    let ledger = Arc::new(Ledger::open(&path).unwrap());

    thread::scope(|s| {
        for t in 0..THREADS {
            let ledger = Arc::clone(&ledger);
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let source = if t % 2 == 0 { Source::Bot } else { Source::Dashboard };
                    ledger.append(sale(t * PER_THREAD + i, source)).unwrap();
                }
            });
        }
    });

    let in_memory = ledger.list_all();
    assert_eq!(in_memory.len(), THREADS * PER_THREAD);

    let ids: HashSet<_> = in_memory.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), THREADS * PER_THREAD, "no duplicates");

    let items: HashSet<_> = in_memory.iter().map(|r| r.item.clone()).collect();
    for n in 0..THREADS * PER_THREAD {
        assert!(items.contains(&format!("Item-{}", n)), "Item-{} lost", n);
    }

    // the file holds the same sequence, in the same order
    assert_eq!(read_records(&path).unwrap(), in_memory);
}

#[test]
fn per_caller_order_is_preserved() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(Ledger::open(dir.path().join("sales.json")).unwrap());

    thread::scope(|s| {
        for t in 0..4 {
            let ledger = Arc::clone(&ledger);
            s.spawn(move || {
                for i in 0..25 {
                    ledger.append(sale(t * 100 + i, Source::Cli)).unwrap();
                }
            });
        }
    });

    // each caller's appends keep their relative order in the total order
    for t in 0..4 {
        let mine: Vec<usize> = ledger
            .list_all()
            .iter()
            .filter_map(|r| r.item.strip_prefix("Item-")?.parse::<usize>().ok())
            .filter(|n| n / 100 == t)
            .collect();
        let mut sorted = mine.clone();
        sorted.sort_unstable();
        assert_eq!(mine, sorted);
        assert_eq!(mine.len(), 25);
    }
}

#[test]
fn readers_see_consistent_snapshots_during_writes() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(Ledger::open(dir.path().join("sales.json")).unwrap());

    thread::scope(|s| {
        let writer = Arc::clone(&ledger);
        s.spawn(move || {
            for i in 0..50 {
                writer.append(sale(i, Source::Bot)).unwrap();
            }
        });

        let reader = Arc::clone(&ledger);
        s.spawn(move || {
            let mut last = 0;
            for _ in 0..200 {
                let snapshot = reader.snapshot();
                assert!(snapshot.len() >= last, "ledger never shrinks");
                for (i, record) in snapshot.iter().enumerate() {
                    assert_eq!(record.item, format!("Item-{}", i));
                }
                last = snapshot.len();
            }
        });
    });

    assert_eq!(ledger.len(), 50);
}

#[test]
fn bot_and_other_callers_share_one_ledger() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sales.json");
    let ledger = Arc::new(Ledger::open(&path).unwrap());
    let bot = BotAdapter::new(Arc::clone(&ledger), Grammar::ItemQtyPrice);

    thread::scope(|s| {
        let bot = bot.clone();
        s.spawn(move || {
            for i in 0..20 {
                bot.handle(&format!("Bot-{}, 1, 500", i)).unwrap();
            }
        });

        let form = Arc::clone(&ledger);
        s.spawn(move || {
            for i in 0..20 {
                form.append(sale(i, Source::Dashboard)).unwrap();
            }
        });
    });

    let all = read_records(&path).unwrap();
    assert_eq!(all.len(), 40);
    assert_eq!(all.iter().filter(|r| r.source == Source::Bot).count(), 20);
    assert!(all
        .iter()
        .filter(|r| r.source == Source::Bot)
        .all(|r| r.total == Amount::Whole(500)));
}

#[test]
fn malformed_input_never_touches_the_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sales.json");
    let ledger = Arc::new(Ledger::open(&path).unwrap());
    let bot = BotAdapter::new(Arc::clone(&ledger), Grammar::ItemQtyPrice);
    let before = std::fs::read_to_string(&path).unwrap();

    for line in ["Apple", "Apple, x, 1", "Apple, 1", ", 1, 1", "Apple, -1, 5"] {
        let reply = bot.handle(line).unwrap();
        assert!(reply.starts_with("❌"), "{:?} was accepted", line);
    }

    assert!(ledger.is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn second_writer_is_locked_out() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sales.json");
    let server = Ledger::open(&path).unwrap();

    // a CLI process opening the same store must not get a stale private copy
    let cli = thread::spawn({
        let path = path.clone();
        move || Ledger::open(&path).map(|_| ())
    })
    .join()
    .unwrap();
    assert!(matches!(cli, Err(StorageError::Locked { .. })));

    server.append(sale(1, Source::Bot)).unwrap();
    drop(server);

    let cli = Ledger::open(&path).unwrap();
    cli.append(sale(2, Source::Cli)).unwrap();
    drop(cli);

    let items: Vec<_> = read_records(&path).unwrap().into_iter().map(|r| r.item).collect();
    assert_eq!(items, ["Item-1", "Item-2"]);
}
