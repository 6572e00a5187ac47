//! Feature-row sinks and the Parquet columnar writer.
//!
//! The aggregator hands each event's buffers to a [`FeatureSink`] exactly
//! once, by move. [`MemorySink`] keeps them in memory for tests and
//! embedding; [`ParquetFeatureWriter`] persists one row per event with
//! `List`-typed columns whose names match the downstream contract exactly.

use std::{fs::File, path::Path, sync::Arc};

use arrow::{
    array::{
        ArrayRef, BooleanBuilder, Float64Builder, Int32Builder, ListBuilder, UInt32Array,
        UInt32Builder,
    },
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use parquet::arrow::ArrowWriter;

use super::{CategoryColumns, EventFeatures, TruthMatchColumns};
use crate::{
    cluster::{DISTANCE_THRESHOLDS_MM, N_RATIO_EXPONENTS},
    utils::{enums::MuonCategory, threshold_label},
    Float, MuhaloResult,
};

/// Receives one event's populated buffers, exactly once per event.
pub trait FeatureSink {
    /// Append one event's output. Ordering across calls is the event ordering.
    fn append(&mut self, features: EventFeatures) -> MuhaloResult<()>;
}

/// A sink keeping every event's buffers in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySink {
    /// One entry per appended event.
    pub events: Vec<EventFeatures>,
}

impl FeatureSink for MemorySink {
    fn append(&mut self, features: EventFeatures) -> MuhaloResult<()> {
        self.events.push(features);
        Ok(())
    }
}

/// A borrowed view of one named output column.
enum ColumnSlice<'a> {
    F64(&'a [Float]),
    I32(&'a [i32]),
    U32(&'a [u32]),
    Bool(&'a [bool]),
}

impl ColumnSlice<'_> {
    fn list_type(&self) -> DataType {
        let item = match self {
            ColumnSlice::F64(_) => DataType::Float64,
            ColumnSlice::I32(_) => DataType::Int32,
            ColumnSlice::U32(_) => DataType::UInt32,
            ColumnSlice::Bool(_) => DataType::Boolean,
        };
        DataType::List(Arc::new(Field::new_list_field(item, true)))
    }

    /// A single-row list array holding this event's values.
    fn into_list_array(self) -> ArrayRef {
        match self {
            ColumnSlice::F64(values) => {
                let mut builder = ListBuilder::new(Float64Builder::new());
                for value in values {
                    builder.values().append_value(*value as f64);
                }
                builder.append(true);
                Arc::new(builder.finish())
            }
            ColumnSlice::I32(values) => {
                let mut builder = ListBuilder::new(Int32Builder::new());
                for value in values {
                    builder.values().append_value(*value);
                }
                builder.append(true);
                Arc::new(builder.finish())
            }
            ColumnSlice::U32(values) => {
                let mut builder = ListBuilder::new(UInt32Builder::new());
                for value in values {
                    builder.values().append_value(*value);
                }
                builder.append(true);
                Arc::new(builder.finish())
            }
            ColumnSlice::Bool(values) => {
                let mut builder = ListBuilder::new(BooleanBuilder::new());
                for value in values {
                    builder.values().append_value(*value);
                }
                builder.append(true);
                Arc::new(builder.finish())
            }
        }
    }
}

impl CategoryColumns {
    fn named_columns(&self, prefix: &str) -> Vec<(String, ColumnSlice<'_>)> {
        let mut columns = vec![
            (format!("{prefix}_pt"), ColumnSlice::F64(&self.pt)),
            (format!("{prefix}_eta"), ColumnSlice::F64(&self.eta)),
            (format!("{prefix}_phi"), ColumnSlice::F64(&self.phi)),
            (format!("{prefix}_dz"), ColumnSlice::F64(&self.dz)),
            (format!("{prefix}_d0"), ColumnSlice::F64(&self.d0)),
            (
                format!("{prefix}_impactFactor"),
                ColumnSlice::F64(&self.impact_factor),
            ),
            (format!("{prefix}_charge"), ColumnSlice::I32(&self.charge)),
        ];
        for (index, threshold) in DISTANCE_THRESHOLDS_MM.iter().enumerate() {
            let label = threshold_label(*threshold);
            columns.push((
                format!("{prefix}_extratracks{label}mm"),
                ColumnSlice::U32(&self.extra_tracks[index]),
            ));
        }
        for (index, threshold) in DISTANCE_THRESHOLDS_MM.iter().enumerate() {
            let label = threshold_label(*threshold);
            columns.push((
                format!("{prefix}_sumExtraTrackPt{label}mm"),
                ColumnSlice::F64(&self.sum_extra_track_pt[index]),
            ));
        }
        for index in 0..N_RATIO_EXPONENTS {
            columns.push((
                format!("{prefix}_chargeWeightedRatio_m{:02}", index + 1),
                ColumnSlice::F64(&self.charge_weighted_ratio[index]),
            ));
        }
        columns.push((
            format!("{prefix}_maxPtRatio"),
            ColumnSlice::F64(&self.max_pt_ratio),
        ));
        columns.push((format!("{prefix}_ptRange"), ColumnSlice::F64(&self.pt_range)));
        columns.push((
            format!("{prefix}_sumExtraPt"),
            ColumnSlice::F64(&self.sum_extra_pt),
        ));
        columns.push((
            format!("{prefix}_extraPtRatio"),
            ColumnSlice::F64(&self.extra_pt_ratio),
        ));
        columns
    }
}

impl TruthMatchColumns {
    fn named_columns(&self, prefix: &str) -> Vec<(String, ColumnSlice<'_>)> {
        vec![
            (format!("{prefix}_index"), ColumnSlice::U32(&self.index)),
            (format!("{prefix}_pt"), ColumnSlice::F64(&self.pt)),
            (format!("{prefix}_eta"), ColumnSlice::F64(&self.eta)),
            (format!("{prefix}_phi"), ColumnSlice::F64(&self.phi)),
            (format!("{prefix}_genPt"), ColumnSlice::F64(&self.gen_pt)),
            (format!("{prefix}_genEta"), ColumnSlice::F64(&self.gen_eta)),
            (format!("{prefix}_genPhi"), ColumnSlice::F64(&self.gen_phi)),
            (
                format!("{prefix}_genPdgId"),
                ColumnSlice::I32(&self.gen_pdg_id),
            ),
            (
                format!("{prefix}_genStatus"),
                ColumnSlice::I32(&self.gen_status),
            ),
            (
                format!("{prefix}_isSignal"),
                ColumnSlice::Bool(&self.is_signal),
            ),
            (
                format!("{prefix}_isPileup"),
                ColumnSlice::Bool(&self.is_pileup),
            ),
            (
                format!("{prefix}_isPrompt"),
                ColumnSlice::Bool(&self.is_prompt),
            ),
            (
                format!("{prefix}_fromHardProcess"),
                ColumnSlice::Bool(&self.from_hard_process),
            ),
            (
                format!("{prefix}_hasPhotonMother"),
                ColumnSlice::Bool(&self.has_photon_mother),
            ),
        ]
    }
}

fn flatten_columns(features: &EventFeatures) -> Vec<(String, ColumnSlice<'_>)> {
    let mut columns = Vec::new();
    for category in MuonCategory::ALL {
        columns.extend(
            features
                .category(category)
                .named_columns(&category.to_string()),
        );
    }
    columns.extend(features.truth_matches.named_columns("muon"));
    columns
}

/// The full output schema: one row per event, one `List` column per output
/// field, plus the per-event ancestry-fault counter.
pub fn feature_schema() -> SchemaRef {
    let prototype = EventFeatures::default();
    let mut fields: Vec<Field> = flatten_columns(&prototype)
        .into_iter()
        .map(|(name, column)| Field::new(name, column.list_type(), true))
        .collect();
    fields.push(Field::new("ancestryFaults", DataType::UInt32, false));
    Arc::new(Schema::new(fields))
}

fn record_batch(features: &EventFeatures, schema: &SchemaRef) -> MuhaloResult<RecordBatch> {
    let mut arrays: Vec<ArrayRef> = flatten_columns(features)
        .into_iter()
        .map(|(_, column)| column.into_list_array())
        .collect();
    arrays.push(Arc::new(UInt32Array::from(vec![features.ancestry_faults])));
    Ok(RecordBatch::try_new(schema.clone(), arrays)?)
}

/// Persists feature rows to a Parquet file, one row per event.
pub struct ParquetFeatureWriter {
    writer: ArrowWriter<File>,
    schema: SchemaRef,
}

impl ParquetFeatureWriter {
    /// Create the output file and write the schema header.
    pub fn create<P: AsRef<Path>>(path: P) -> MuhaloResult<Self> {
        let schema = feature_schema();
        let file = File::create(path)?;
        let writer = ArrowWriter::try_new(file, schema.clone(), None)?;
        Ok(Self { writer, schema })
    }

    /// The schema this writer persists.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Finish the file. Must be called for the output to be readable.
    pub fn close(self) -> MuhaloResult<()> {
        self.writer.close()?;
        Ok(())
    }
}

impl FeatureSink for ParquetFeatureWriter {
    fn append(&mut self, features: EventFeatures) -> MuhaloResult<()> {
        let batch = record_batch(&features, &self.schema)?;
        self.writer.write(&batch)?;
        Ok(())
    }
}
