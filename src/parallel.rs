//! Parallel reading: workers read disjoint docname chunks on independent
//! inventory copies, and the coordinator folds every batch back in.

use std::collections::BTreeSet;

use crate::error::Error;
use crate::inventory::Inventory;
use crate::reader::MarkupParser;

/// One worker's outcome: chunk position, the docnames it owned, and its inventory copy.
type Batch = (usize, BTreeSet<String>, Result<Inventory, Error>);

/// Read `docnames` with up to `workers` threads. Each thread gets a clone of
/// the inventory and reads its chunk sequentially; results come back over a
/// channel and are merged on the calling thread with
/// [`Inventory::merge_info_from`], once per chunk, in chunk order.
/// With one worker (or one document) everything is read in place.
///
/// # Errors
///
/// Returns the first read failure in chunk order. Chunks before it are merged.
pub fn read_parallel(
    inventory: &mut Inventory,
    docnames: &BTreeSet<String>,
    workers: usize,
    parser: &dyn MarkupParser,
) -> Result<(), Error> {
    let workers = workers.max(1);
    if workers == 1 || docnames.len() < 2 {
        for docname in docnames {
            inventory.read_doc(docname, parser)?;
        }
        return Ok(());
    }

    for docname in docnames {
        inventory.clear_doc(docname);
    }
    let ordered: Vec<&String> = docnames.iter().collect();
    let chunk_size = ordered.len().div_ceil(workers);
    let (tx, rx) = crossbeam_channel::unbounded::<Batch>();

    let template: &Inventory = inventory;
    std::thread::scope(|s| {
        for (index, chunk) in ordered.chunks(chunk_size).enumerate() {
            let tx = tx.clone();
            let mut worker = template.clone();
            s.spawn(move || {
                let owned: BTreeSet<String> = chunk.iter().map(|d| return (*d).clone()).collect();
                let result = owned
                    .iter()
                    .try_for_each(|docname| return worker.read_doc(docname, parser))
                    .map(|()| return worker);
                // The receiver outlives the scope, so sending cannot fail.
                let _sent = tx.send((index, owned, result));
            });
        }
    });
    drop(tx);

    let mut batches: Vec<Batch> = rx.iter().collect();
    batches.sort_by_key(|(index, _, _)| return *index);
    for (index, owned, result) in batches {
        let worker = result?;
        inventory.merge_info_from(&owned, &worker)?;
        tracing::debug!(batch = index, documents = owned.len(), "merged worker batch");
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;
    use crate::domains::DomainRegistry;
    use crate::reader::LineMarkup;

    fn write(root: &Path, name: &str, content: &str) {
        fs::write(root.join(name), content).unwrap();
    }

    #[test]
    fn parallel_read_matches_serial_read() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.md", "# Home\n```{toctree}\na\nb\nc\n```\n");
        for name in ["a", "b", "c"] {
            write(dir.path(), &format!("{name}.md"), &format!("({name}-label)=\n# Title {name}\n"));
        }

        let mut serial = Inventory::new(dir.path(), Config::default(), DomainRegistry::with_standard()).unwrap();
        let docnames = serial.find_files().unwrap();
        read_parallel(&mut serial, &docnames, 1, &LineMarkup).unwrap();

        let mut parallel = Inventory::new(dir.path(), Config::default(), DomainRegistry::with_standard()).unwrap();
        parallel.find_files().unwrap();
        read_parallel(&mut parallel, &docnames, 3, &LineMarkup).unwrap();

        for docname in &docnames {
            let left = serial.record(docname).unwrap();
            let right = parallel.record(docname).unwrap();
            assert_eq!(left.title, right.title);
            assert_eq!(left.metadata, right.metadata);
        }
        assert_eq!(parallel.toctree_includes("index"), ["a", "b", "c"]);
        assert_eq!(
            serial.domains.export_all().unwrap(),
            parallel.domains.export_all().unwrap()
        );
    }

    #[test]
    fn worker_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "# A\n");
        write(dir.path(), "b.md", "```{bogus}\n```\n");
        let mut inventory = Inventory::new(dir.path(), Config::default(), DomainRegistry::with_standard()).unwrap();
        let docnames = inventory.find_files().unwrap();
        let err = read_parallel(&mut inventory, &docnames, 2, &LineMarkup).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(inventory.record("a").is_some());
    }
}
