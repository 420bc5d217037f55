// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod diff;
pub mod export;
pub mod inspect;
pub mod replay_at;
pub mod timeline;
pub mod validate;

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

pub(crate) fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}
