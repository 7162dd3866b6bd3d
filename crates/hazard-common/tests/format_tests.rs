//! Contract tests for the column format descriptor.

use hazard_common::ColumnFormat;

fn deterministic_format() -> ColumnFormat {
    ColumnFormat {
        csv_columns: vec![
            "LATITUDE".to_string(),
            "LONGITUDE".to_string(),
            "MAPPED_PGAD".to_string(),
            "MAPPED_S1D".to_string(),
            "MAPPED_SSD".to_string(),
        ],
        scalar_columns: vec![
            "LATITUDE".to_string(),
            "LONGITUDE".to_string(),
            "MAPPED_PGAD".to_string(),
        ],
        spectral_columns: vec!["MAPPED_SSD".to_string(), "MAPPED_S1D".to_string()],
        data_columns: vec![
            "latitude".to_string(),
            "longitude".to_string(),
            "pgad".to_string(),
            "sad".to_string(),
        ],
    }
}

#[test]
fn valid_descriptor_passes() {
    assert!(deterministic_format().validate().is_ok());
}

#[test]
fn positions_resolved_by_name() {
    let format = deterministic_format();
    assert_eq!(format.position_of("LATITUDE"), Some(0));
    assert_eq!(format.position_of("MAPPED_SSD"), Some(4));
    assert_eq!(format.position_of("MAPPED_S1D"), Some(3));
    assert_eq!(format.position_of("UNKNOWN"), None);
}

#[test]
fn descriptor_reorder_keeps_lookup_stable() {
    // Shuffling the input list moves positions but names still resolve.
    let mut format = deterministic_format();
    format.csv_columns.swap(3, 4);
    assert!(format.validate().is_ok());
    assert_eq!(format.position_of("MAPPED_SSD"), Some(3));
    assert_eq!(format.position_of("MAPPED_S1D"), Some(4));
}

#[test]
fn output_column_accessors() {
    let format = deterministic_format();
    assert_eq!(format.scalar_output_columns(), &["latitude", "longitude", "pgad"]);
    assert_eq!(format.array_column(), "sad");
}

#[test]
fn undeclared_column_rejected() {
    let mut format = deterministic_format();
    format.spectral_columns.push("MAPPED_S5D".to_string());
    assert!(format.validate().is_err());
}

#[test]
fn silently_dropped_column_rejected() {
    // An input column that is neither scalar nor spectral violates the
    // "no column silently dropped" contract.
    let mut format = deterministic_format();
    format.csv_columns.push("MAPPED_EXTRA".to_string());
    assert!(format.validate().is_err());
}

#[test]
fn overlapping_declaration_rejected() {
    let mut format = deterministic_format();
    format.scalar_columns.push("MAPPED_SSD".to_string());
    assert!(format.validate().is_err());
}

#[test]
fn wrong_output_arity_rejected() {
    let mut format = deterministic_format();
    format.data_columns.pop();
    assert!(format.validate().is_err());
}

#[test]
fn no_spectral_columns_rejected() {
    let mut format = deterministic_format();
    format.scalar_columns.extend(format.spectral_columns.drain(..));
    assert!(format.validate().is_err());
}
