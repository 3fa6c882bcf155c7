use std::time::Instant;

use colcalc_engine::engine::{Chunk, ChunkValue, ColumnCatalog, ColumnDescriptor};
use log::debug;

use super::debounce::TimerHandle;
use super::reduce::{EditorOutput, reduce};
use super::state::ColumnEditor;
use crate::error::{CoreError, Result};
use crate::preview::PreviewColumn;

/// What happened during a [`ColumnEditor::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorEvents {
    /// New preview title, when the rename debounce fired.
    pub renamed: Option<String>,
    pub recompiled: bool,
}

/// Inputs of one recompile, detached from the editor so it can run elsewhere.
#[derive(Debug, Clone)]
pub struct RecompileJob {
    handle: TimerHandle,
    formula: Vec<Chunk>,
    catalog: ColumnCatalog,
    name: String,
}

impl RecompileJob {
    pub fn run(&self) -> EditorOutput {
        reduce(&self.formula, &self.catalog, &self.name)
    }
}

impl ColumnEditor {
    fn touch(&mut self, now: Instant) {
        self.revision += 1;
        self.saved = false;
        self.recompile_timer.schedule(now);
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.formula.len() {
            Ok(())
        } else {
            Err(CoreError::ChunkIndex(index))
        }
    }

    pub fn push_chunk(&mut self, chunk: Chunk, now: Instant) {
        let chunk = self.attach_descriptor(chunk);
        self.formula.push(chunk);
        self.touch(now);
    }

    /// Insert before `index`; `index == len` appends.
    pub fn insert_chunk(&mut self, index: usize, chunk: Chunk, now: Instant) -> Result<()> {
        if index > self.formula.len() {
            return Err(CoreError::ChunkIndex(index));
        }
        let chunk = self.attach_descriptor(chunk);
        self.formula.insert(index, chunk);
        self.touch(now);
        Ok(())
    }

    pub fn remove_chunk(&mut self, index: usize, now: Instant) -> Result<Chunk> {
        self.check_index(index)?;
        let removed = self.formula.remove(index);
        self.touch(now);
        Ok(removed)
    }

    /// Overwrite a chunk's value in place. Changing its kind is an error.
    pub fn update_chunk(&mut self, index: usize, value: ChunkValue, now: Instant) -> Result<()> {
        self.check_index(index)?;
        let mut chunk = self.formula[index].clone();
        chunk.set_value(value)?;
        self.formula[index] = self.attach_descriptor(chunk);
        self.touch(now);
        Ok(())
    }

    /// Move the chunk at `from` so it ends up at `to`.
    pub fn move_chunk(&mut self, from: usize, to: usize, now: Instant) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from != to {
            let chunk = self.formula.remove(from);
            self.formula.insert(to, chunk);
            self.touch(now);
        }
        Ok(())
    }

    pub fn clear_formula(&mut self, now: Instant) {
        if !self.formula.is_empty() {
            self.formula.clear();
            self.touch(now);
        }
    }

    /// Rename the column. The preview title follows after the rename debounce.
    pub fn set_name(&mut self, name: &str, now: Instant) {
        if self.name == name {
            return;
        }
        self.name = name.to_string();
        self.rename_timer.schedule(now);
        self.touch(now);
    }

    /// Fire whichever timers are due.
    pub fn tick(&mut self, now: Instant) -> EditorEvents {
        let mut events = EditorEvents::default();
        if self.rename_timer.poll(now).is_some() {
            events.renamed = Some(self.apply_rename());
        }
        if let Some(handle) = self.recompile_timer.poll(now) {
            events.recompiled = self.recompile(handle);
        }
        events
    }

    /// Fire both timers now, e.g. before saving.
    pub fn flush(&mut self) -> EditorEvents {
        let mut events = EditorEvents::default();
        if self.rename_timer.flush().is_some() {
            events.renamed = Some(self.apply_rename());
        }
        if let Some(handle) = self.recompile_timer.flush() {
            events.recompiled = self.recompile(handle);
        }
        events
    }

    /// Take a due recompile without running it. The result is handed back
    /// through [`ColumnEditor::apply_recompile`].
    pub fn take_recompile(&mut self, now: Instant) -> Option<RecompileJob> {
        let handle = self.recompile_timer.poll(now)?;
        Some(RecompileJob {
            handle,
            formula: self.formula.clone(),
            catalog: self.catalog.clone(),
            name: self.name.clone(),
        })
    }

    /// Store the output of `job` unless an edit has superseded it.
    pub fn apply_recompile(&mut self, job: &RecompileJob, output: EditorOutput) -> bool {
        if !self.recompile_timer.is_current(job.handle) {
            debug!("discarding stale recompile");
            return false;
        }
        self.output = output;
        self.compiled_revision = self.revision;
        true
    }

    fn recompile(&mut self, handle: TimerHandle) -> bool {
        let job = RecompileJob {
            handle,
            formula: self.formula.clone(),
            catalog: self.catalog.clone(),
            name: self.name.clone(),
        };
        let output = job.run();
        self.apply_recompile(&job, output)
    }

    fn apply_rename(&mut self) -> String {
        self.preview_title = self.name.trim().to_string();
        debug!("preview title is now {:?}", self.preview_title);
        self.preview_title.clone()
    }

    /// The column to show in the preview, once the formula compiles. It is
    /// marked as editing until the column is saved or confirmed.
    pub fn preview_column(&self, css_class: &str) -> Option<PreviewColumn> {
        let compiled = self.output.compiled.as_ref()?;
        let mut column = PreviewColumn::from_compiled(compiled, css_class);
        column.editing = !self.saved;
        if self.preview_title.is_empty() {
            Some(column)
        } else {
            Some(column.with_title(self.preview_title.clone()))
        }
    }

    /// Descriptor of the new column, if the current formula and name can be saved.
    pub fn new_column(&mut self) -> Result<ColumnDescriptor> {
        self.flush();
        if !self.output.is_valid {
            let reason = self.output.error.clone().unwrap_or_default();
            return Err(CoreError::NotSavable(reason));
        }
        match &self.output.compiled {
            Some(compiled) => Ok(compiled.descriptor()),
            None => Err(CoreError::NotSavable("column name is empty".to_string())),
        }
    }

    /// The catalog's columns followed by the new column.
    pub fn confirmed_columns(&mut self) -> Result<Vec<ColumnDescriptor>> {
        let column = self.new_column()?;
        Ok(self.catalog.with_column(column).into_columns())
    }

    /// Hand the new column to `on_add_column`. Not called when the column
    /// cannot be saved.
    pub fn save<F>(&mut self, on_add_column: F) -> Result<()>
    where
        F: FnOnce(ColumnDescriptor),
    {
        let column = self.new_column()?;
        on_add_column(column);
        self.saved = true;
        Ok(())
    }

    /// Hand the full updated column list to `on_confirm`.
    pub fn confirm<F>(&mut self, on_confirm: F) -> Result<()>
    where
        F: FnOnce(Vec<ColumnDescriptor>),
    {
        let columns = self.confirmed_columns()?;
        on_confirm(columns);
        self.saved = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colcalc_engine::engine::{ERR_TRAILING_OPERATOR, Operator, ValueType};
    use std::time::Duration;

    const MS: Duration = Duration::from_millis(1);

    fn editor() -> ColumnEditor {
        ColumnEditor::new(ColumnCatalog::new(vec![
            ColumnDescriptor::new("revenue", "Revenue", ValueType::DollarAmt),
            ColumnDescriptor::new("units", "Units", ValueType::Quantity),
        ]))
    }

    #[test]
    fn test_recompile_waits_for_tick() {
        let start = Instant::now();
        let mut editor = editor();
        editor.push_chunk(Chunk::column("revenue"), start);
        assert!(!editor.is_up_to_date());
        assert!(!editor.output().is_valid);

        let events = editor.tick(start);
        assert!(events.recompiled);
        assert!(editor.is_up_to_date());
        assert!(editor.output().is_valid);
    }

    #[test]
    fn test_column_chunks_get_descriptor_snapshot() {
        let start = Instant::now();
        let mut editor = editor();
        editor.push_chunk(Chunk::column("units"), start);
        assert_eq!(
            editor.formula()[0].column.as_ref().map(|c| c.title.as_str()),
            Some("Units")
        );

        editor
            .update_chunk(0, ChunkValue::Column("revenue".into()), start)
            .unwrap();
        assert_eq!(
            editor.formula()[0].column.as_ref().map(|c| c.title.as_str()),
            Some("Revenue")
        );
    }

    #[test]
    fn test_update_cannot_change_kind() {
        let start = Instant::now();
        let mut editor = editor();
        editor.push_chunk(Chunk::column("units"), start);
        let err = editor
            .update_chunk(0, ChunkValue::Number("2".into()), start)
            .unwrap_err();
        assert!(matches!(err, CoreError::Engine(_)));
        assert!(matches!(
            editor.remove_chunk(3, start),
            Err(CoreError::ChunkIndex(3))
        ));
    }

    #[test]
    fn test_rename_is_debounced() {
        let start = Instant::now();
        let mut editor = editor();
        editor.push_chunk(Chunk::column("revenue"), start);
        editor.set_name("Rev", start);
        editor.set_name("Revenue Copy", start + 200 * MS);

        let events = editor.tick(start + 600 * MS);
        assert_eq!(events.renamed, None);
        assert_eq!(editor.preview_title(), "");

        let events = editor.tick(start + 700 * MS);
        assert_eq!(events.renamed.as_deref(), Some("Revenue Copy"));
        let column = editor.preview_column("column-new").unwrap();
        assert_eq!(column.title, "Revenue Copy");
    }

    #[test]
    fn test_stale_recompile_is_discarded() {
        let start = Instant::now();
        let mut editor = editor();
        editor.set_name("Total", start);
        editor.push_chunk(Chunk::column("revenue"), start);
        let job = editor.take_recompile(start).unwrap();

        // A newer edit lands before the first job finishes.
        editor.push_chunk(Chunk::operator(Operator::Addition), start + MS);
        assert!(!editor.apply_recompile(&job, job.run()));
        assert!(!editor.output().is_valid);

        editor.tick(start + MS);
        assert_eq!(editor.output().error.as_deref(), Some(ERR_TRAILING_OPERATOR));
    }

    #[test]
    fn test_save_requires_valid_named_formula() {
        let start = Instant::now();
        let mut editor = editor();
        editor.push_chunk(Chunk::column("revenue"), start);

        let mut calls = 0;
        let err = editor.save(|_| calls += 1).unwrap_err();
        assert!(matches!(err, CoreError::NotSavable(_)));
        assert_eq!(calls, 0);

        editor.set_name("Revenue Copy", start);
        let mut saved = None;
        editor.save(|column| saved = Some(column)).unwrap();
        let saved = saved.unwrap();
        assert_eq!(saved.field, "revenue_copy");
        assert_eq!(saved.expression.as_deref(), Some("revenue"));
        assert!(editor.is_saved());
    }

    #[test]
    fn test_preview_stops_editing_once_saved() {
        let start = Instant::now();
        let mut editor = editor();
        editor.push_chunk(Chunk::column("revenue"), start);
        editor.set_name("Revenue Copy", start);
        editor.flush();
        assert!(editor.preview_column("column-new").unwrap().editing);

        editor.save(|_| {}).unwrap();
        assert!(!editor.preview_column("column-new").unwrap().editing);

        editor.push_chunk(Chunk::operator(Operator::Multiplication), start);
        editor.push_chunk(Chunk::number("2"), start);
        editor.flush();
        assert!(editor.preview_column("column-new").unwrap().editing);
    }

    #[test]
    fn test_confirm_appends_to_catalog() {
        let start = Instant::now();
        let mut editor = editor();
        editor.push_chunk(Chunk::column("revenue"), start);
        editor.push_chunk(Chunk::operator(Operator::Division), start);
        editor.push_chunk(Chunk::column("units"), start);
        editor.set_name("Unit Price", start);

        let mut columns = Vec::new();
        editor.confirm(|cols| columns = cols).unwrap();
        let fields: Vec<&str> = columns.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["revenue", "units", "unit_price"]);
        assert_eq!(
            columns[2].expression.as_deref(),
            Some("COALESCE(revenue / NULLIF(units, 0), 0)")
        );
    }

    #[test]
    fn test_move_chunk_reorders() {
        let start = Instant::now();
        let mut editor = editor();
        editor.push_chunk(Chunk::column("revenue"), start);
        editor.push_chunk(Chunk::operator(Operator::Subtraction), start);
        editor.push_chunk(Chunk::column("units"), start);
        editor.move_chunk(0, 2, start).unwrap();
        assert_eq!(
            editor.formula()[2].value(),
            &ChunkValue::Column("revenue".into())
        );
        editor.clear_formula(start);
        assert!(editor.formula().is_empty());
    }
}
