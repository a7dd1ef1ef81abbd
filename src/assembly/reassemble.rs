//! Orchestrates the full assembly pipeline over a set of raw measurement
//! rows and DSL commands.

use tracing::instrument;

use crate::dsl::Command;
use crate::transactions::MeasurementRow;

use super::primary::PrimaryTimelines;
use super::properties::PropertyTimelines;
use super::split::apply_splits;
use super::survey::SurveyCatalog;
use super::treebuilder::{assign_tree_uids, build_alias_resolver};
use super::trees::generate_implied_rows;

/// Clones raw measurement rows without mutation; the assembler never
/// touches caller-owned data.
pub fn clone_raw_measurements(rows: &[MeasurementRow]) -> Vec<MeasurementRow> {
    rows.to_vec()
}

/// Runs the full assembly sequence: resolver build → uid assignment →
/// split apply → property apply → primary apply → implied rows → stable
/// sort by `(date, site, plot, tag, row_number)`.
#[instrument(skip_all, fields(rows = rows.len(), commands = commands.len()))]
pub fn assemble_dataset(
    rows: &[MeasurementRow],
    commands: &[Command],
    catalog: &SurveyCatalog,
    drop_after_absent_surveys: u32,
) -> Vec<MeasurementRow> {
    let mut assembled = clone_raw_measurements(rows);

    let resolver = build_alias_resolver(&assembled, commands);
    assign_tree_uids(&mut assembled, &resolver);
    apply_splits(&mut assembled, commands, &resolver, catalog);

    let properties = PropertyTimelines::build(commands, &resolver);
    properties.apply(&mut assembled);

    let primaries = PrimaryTimelines::build(commands, &resolver);
    primaries.apply(&mut assembled);

    let implied = generate_implied_rows(&assembled, catalog, drop_after_absent_surveys);
    assembled.extend(implied);

    assembled.sort_by(|a, b| {
        (a.date, &a.site, &a.plot, &a.tag, a.row_number).cmp(&(
            b.date,
            &b.site,
            &b.plot,
            &b.tag,
            b.row_number,
        ))
    });

    assembled
}
