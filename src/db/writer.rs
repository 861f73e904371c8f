//! Threaded writer funnel
//!
//! Runs a [`StorageEngine`] on a dedicated thread and feeds it owned rows
//! through a bounded channel. The walker stays the single producer, so row
//! order and commit boundaries are the same as writing on the caller's
//! thread; the walker just no longer waits on SQLite while it encodes the
//! next shape.
//!
//! On a write error the thread stops and drops its receiver. The next send
//! fails with [`DbError::ChannelClosed`]; [`BatchedWriter::finish`] then
//! returns the original error.

use crate::db::{
    AssociationRow, GeometryRow, InstanceRow, MeshRow, ModelRow, RowSink, ShapeRow, StorageEngine,
};
use crate::error::{DbError, DbResult};
use crate::material::Material;
use crate::scene::BBox3;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Message types sent to the writer thread
#[derive(Debug)]
pub enum WriterMessage {
    Model {
        id: i64,
        name: String,
        bbox: Option<BBox3>,
    },
    Instance {
        id: i64,
        class_id: i64,
        name: String,
        significant: bool,
        bbox: Option<BBox3>,
    },
    Association(AssociationRow),
    Material(Box<Material>),
    Shape {
        id: i64,
        instance_id: i64,
        geometry_id: i64,
        material_id: i64,
        bbox: Option<BBox3>,
        matrix: String,
    },
    Geometry {
        id: i64,
        hashcode: i64,
        geometry_type: u32,
        data: Vec<u8>,
    },
    Mesh {
        id: i64,
        geometry_id: i64,
        triangle_count: u32,
        bbox: Option<BBox3>,
        data: Vec<u8>,
    },
    BoundingBox {
        id: i64,
        bbox: BBox3,
    },
    /// Stop and hand the engine back
    Shutdown,
}

/// Statistics about write operations
#[derive(Debug, Default)]
pub struct WriterStats {
    /// Rows handed to the engine
    pub rows_written: AtomicU64,

    /// Blob bytes handed to the engine
    pub blob_bytes: AtomicU64,
}

impl WriterStats {
    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    pub fn blob_bytes(&self) -> u64 {
        self.blob_bytes.load(Ordering::Relaxed)
    }
}

/// Handle for sending rows to the writer
#[derive(Clone)]
pub struct WriterHandle {
    sender: Sender<WriterMessage>,
    stats: Arc<WriterStats>,
}

impl WriterHandle {
    pub fn send(&self, message: WriterMessage) -> DbResult<()> {
        self.sender.send(message).map_err(|_| DbError::ChannelClosed)
    }

    /// Get writer statistics
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }
}

impl RowSink for WriterHandle {
    fn add_model(&mut self, row: &ModelRow<'_>) -> DbResult<()> {
        self.send(WriterMessage::Model {
            id: row.id,
            name: row.name.to_string(),
            bbox: row.bbox,
        })
    }

    fn add_instance(&mut self, row: &InstanceRow<'_>) -> DbResult<()> {
        self.send(WriterMessage::Instance {
            id: row.id,
            class_id: row.class_id,
            name: row.name.to_string(),
            significant: row.significant,
            bbox: row.bbox,
        })
    }

    fn add_association(&mut self, row: &AssociationRow) -> DbResult<()> {
        self.send(WriterMessage::Association(*row))
    }

    fn add_material(&mut self, material: &Material) -> DbResult<()> {
        self.send(WriterMessage::Material(Box::new(material.clone())))
    }

    fn add_shape(&mut self, row: &ShapeRow<'_>) -> DbResult<()> {
        self.send(WriterMessage::Shape {
            id: row.id,
            instance_id: row.instance_id,
            geometry_id: row.geometry_id,
            material_id: row.material_id,
            bbox: row.bbox,
            matrix: row.matrix.to_string(),
        })
    }

    fn add_geometry(&mut self, row: &GeometryRow<'_>) -> DbResult<()> {
        self.send(WriterMessage::Geometry {
            id: row.id,
            hashcode: row.hashcode,
            geometry_type: row.geometry_type,
            data: row.data.to_vec(),
        })
    }

    fn add_mesh(&mut self, row: &MeshRow<'_>) -> DbResult<()> {
        self.send(WriterMessage::Mesh {
            id: row.id,
            geometry_id: row.geometry_id,
            triangle_count: row.triangle_count,
            bbox: row.bbox,
            data: row.data.to_vec(),
        })
    }

    fn update_bounding_box(&mut self, id: i64, bbox: &BBox3) -> DbResult<()> {
        self.send(WriterMessage::BoundingBox { id, bbox: *bbox })
    }
}

/// Storage engine running in its own thread
pub struct BatchedWriter {
    /// Thread handle; yields the engine back on shutdown
    handle: Option<JoinHandle<DbResult<StorageEngine>>>,

    /// Writer handle for sending messages
    writer_handle: WriterHandle,
}

impl BatchedWriter {
    /// Move `engine` onto a new writer thread
    pub fn spawn(engine: StorageEngine, channel_size: usize) -> DbResult<Self> {
        let (sender, receiver) = bounded(channel_size);
        let stats = Arc::new(WriterStats::default());

        let writer_handle = WriterHandle {
            sender,
            stats: Arc::clone(&stats),
        };

        let path = engine.path().to_path_buf();
        let handle = thread::Builder::new()
            .name("ewc-writer".into())
            .spawn(move || writer_thread(engine, receiver, stats))
            .map_err(|e| DbError::CreateFailed {
                path,
                reason: format!("Failed to spawn writer thread: {}", e),
            })?;

        Ok(Self {
            handle: Some(handle),
            writer_handle,
        })
    }

    /// Get a handle for sending messages to the writer
    pub fn handle(&self) -> WriterHandle {
        self.writer_handle.clone()
    }

    /// Drain the queue, stop the thread and take the engine back
    pub fn finish(mut self) -> DbResult<StorageEngine> {
        // Fails only if the thread already stopped; join reports why
        let _ = self.writer_handle.send(WriterMessage::Shutdown);

        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(DbError::WriterPanicked),
            },
            None => Err(DbError::InvalidState("writer already finished")),
        }
    }
}

fn writer_thread(
    mut engine: StorageEngine,
    receiver: Receiver<WriterMessage>,
    stats: Arc<WriterStats>,
) -> DbResult<StorageEngine> {
    while let Ok(message) = receiver.recv() {
        if let WriterMessage::Shutdown = message {
            break;
        }
        if let Err(e) = apply(&mut engine, message, &stats) {
            error!("Writer thread stopping: {}", e);
            return Err(e);
        }
    }

    debug!("Writer thread done after {} rows", stats.rows_written());
    Ok(engine)
}

fn apply(engine: &mut StorageEngine, message: WriterMessage, stats: &WriterStats) -> DbResult<()> {
    match message {
        WriterMessage::Model { id, name, bbox } => {
            engine.add_model(&ModelRow { id, name: &name, bbox })?;
        }
        WriterMessage::Instance {
            id,
            class_id,
            name,
            significant,
            bbox,
        } => {
            engine.add_instance(&InstanceRow {
                id,
                class_id,
                name: &name,
                significant,
                bbox,
            })?;
        }
        WriterMessage::Association(row) => engine.add_association(&row)?,
        WriterMessage::Material(material) => engine.add_material(&material)?,
        WriterMessage::Shape {
            id,
            instance_id,
            geometry_id,
            material_id,
            bbox,
            matrix,
        } => {
            engine.add_shape(&ShapeRow {
                id,
                instance_id,
                geometry_id,
                material_id,
                bbox,
                matrix: &matrix,
            })?;
        }
        WriterMessage::Geometry {
            id,
            hashcode,
            geometry_type,
            data,
        } => {
            stats.blob_bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
            engine.add_geometry(&GeometryRow {
                id,
                hashcode,
                geometry_type,
                data: &data,
            })?;
        }
        WriterMessage::Mesh {
            id,
            geometry_id,
            triangle_count,
            bbox,
            data,
        } => {
            stats.blob_bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
            engine.add_mesh(&MeshRow {
                id,
                geometry_id,
                triangle_count,
                bbox,
                data: &data,
            })?;
        }
        WriterMessage::BoundingBox { id, bbox } => engine.update_bounding_box(id, &bbox)?,
        WriterMessage::Shutdown => return Ok(()),
    }

    stats.rows_written.fetch_add(1, Ordering::Relaxed);
    Ok(())
}
