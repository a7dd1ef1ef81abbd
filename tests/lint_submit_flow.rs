//! End-to-end lint-then-submit flow across a tempdir-backed workspace,
//! covering a retag via a primary alias across two transactions.

use std::fs;
use std::path::Path;

use forest_ledger::engine::{lint_transaction, submit_transaction};
use forest_ledger::ledger::Ledger;

fn write_config(dir: &Path) {
    fs::write(
        dir.join("taxonomy.toml"),
        "[[species]]\ngenus = \"Picea\"\nspecies = \"abies\"\ncode = \"PICABI\"\n",
    )
    .unwrap();
    fs::write(
        dir.join("sites.toml"),
        "[sites.BRNV]\nzone_order = [\"H4\"]\nplots = [\"H4\"]\n",
    )
    .unwrap();
    fs::write(
        dir.join("surveys.toml"),
        "[[surveys]]\nid = \"2019\"\nstart = 2019-06-01\nend = 2019-12-31\n\n\
         [[surveys]]\nid = \"2020\"\nstart = 2020-01-01\nend = 2020-12-31\n",
    )
    .unwrap();
    fs::write(
        dir.join("validation.toml"),
        "rounding = \"half_up\"\ndbh_pct_warn = 0.08\ndbh_pct_error = 0.16\n\
         dbh_abs_floor_warn_mm = 3\ndbh_abs_floor_error_mm = 6\nretag_delta_pct = 0.1\n\
         new_tree_flag_min_dbh_mm = 50\ndrop_after_absent_surveys = 2\n",
    )
    .unwrap();
    fs::write(
        dir.join("datasheets.toml"),
        "show_previous_surveys = 2\nsort = \"public_tag_numeric_asc\"\nshow_zombie_asterisk = true\n",
    )
    .unwrap();
}

fn write_tx(dir: &Path, measurements: &str, updates: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("measurements.csv"), measurements).unwrap();
    fs::write(dir.join("updates.tdl"), updates).unwrap();
}

#[test]
fn two_stems_same_tag_then_retag_via_primary_alias() {
    let config_dir = tempfile::tempdir().unwrap();
    write_config(config_dir.path());
    let workspace = tempfile::tempdir().unwrap();

    let tx1 = tempfile::tempdir().unwrap();
    write_tx(
        tx1.path(),
        "site,plot,tag,date,dbh_mm,health,standing,notes\n\
         BRNV,H4,112,2019-06-16,171,9,TRUE,\n\
         BRNV,H4,112,2019-06-16,95,7,TRUE,\n",
        "",
    );

    let lint1 = lint_transaction(tx1.path(), config_dir.path()).unwrap();
    assert!(!lint1.has_errors(), "unexpected lint errors: {:?}", lint1.issues);
    assert_eq!(lint1.measurement_rows.len(), 2);
    let tree_uid = lint1.measurement_rows[0].tree_uid.clone().unwrap();
    assert_eq!(lint1.measurement_rows[1].tree_uid.as_deref(), Some(tree_uid.as_str()));

    let submit1 = submit_transaction(tx1.path(), config_dir.path(), workspace.path()).unwrap();
    assert!(submit1.accepted);
    assert_eq!(submit1.version_seq, Some(1));

    // Idempotent resubmission of the same transaction is a silent no-op.
    let resubmit1 = submit_transaction(tx1.path(), config_dir.path(), workspace.path()).unwrap();
    assert!(!resubmit1.accepted);
    assert_eq!(resubmit1.version_seq, None);
    assert_eq!(resubmit1.tx_id, submit1.tx_id);

    let tx2 = tempfile::tempdir().unwrap();
    write_tx(
        tx2.path(),
        "site,plot,tag,date,dbh_mm,health,standing,notes\n\
         BRNV,H4,508,2020-06-16,180,9,TRUE,\n\
         BRNV,H4,508,2020-06-16,100,7,TRUE,\n",
        "ALIAS BRNV/H4/508 TO BRNV/H4/112 PRIMARY EFFECTIVE 2020-06-15\n",
    );

    let submit2 = submit_transaction(tx2.path(), config_dir.path(), workspace.path()).unwrap();
    assert!(submit2.accepted);
    assert_eq!(submit2.version_seq, Some(2));

    let ledger = Ledger::new(workspace.path());
    let observations = ledger.load_existing_observations().unwrap();
    assert_eq!(observations.len(), 4);

    for row in &observations {
        assert_eq!(row.tree_uid, tree_uid);
        if row.date == "2019-06-16" {
            assert_eq!(row.public_tag, "112");
        } else if row.date == "2020-06-16" {
            assert_eq!(row.public_tag, "508");
        }
    }

    let versions = ledger.list_versions().unwrap();
    assert_eq!(versions, vec![1, 2]);
}

#[test]
fn lint_reports_missing_required_column_as_format_error() {
    let config_dir = tempfile::tempdir().unwrap();
    write_config(config_dir.path());

    let tx = tempfile::tempdir().unwrap();
    write_tx(tx.path(), "site,plot,tag,date\nBRNV,H4,112,2019-06-16\n", "");

    let result = lint_transaction(tx.path(), config_dir.path());
    assert!(result.is_err());
}
