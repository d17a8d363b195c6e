//! Tiled render drivers.
//!
//! The image is carved into 32×32 chunks handed out by an atomic counter;
//! each pixel is traced independently, packed, and blitted. Two drivers share
//! the tile loop: [`BlockingRenderer`] keeps the calling thread in the loop
//! and returns when the image is done, [`CallbackRenderer`] runs entirely on
//! its own workers and hands the buffer to a callback from whichever worker
//! finishes last. Both take the scene lock for the duration of a job.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error};

use crate::error::{Error, Result};
use crate::pixels::ImageFormat;
use crate::scene::CompositeScene;

pub const RENDER_CHUNK_SIZE: usize = 32;

const STATE_NORMAL: u8 = 0;
const STATE_CANCEL: u8 = 1;
const STATE_QUIT: u8 = 2;

fn worker_count(threads: Option<usize>, reserve_caller: bool) -> usize {
    match threads {
        Some(n) => n,
        None => {
            let hw = thread::available_parallelism().map_or(1, |n| n.get());
            if reserve_caller {
                hw.saturating_sub(1)
            } else {
                hw.max(1)
            }
        }
    }
}

// ─── Tile geometry ──────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct TileGrid {
    chunks_x: u32,
    chunks_y: u32,
}

impl TileGrid {
    fn of(format: &ImageFormat) -> Self {
        TileGrid {
            chunks_x: ((format.width + RENDER_CHUNK_SIZE - 1) / RENDER_CHUNK_SIZE) as u32,
            chunks_y: ((format.height + RENDER_CHUNK_SIZE - 1) / RENDER_CHUNK_SIZE) as u32,
        }
    }

    fn total(&self) -> u32 {
        self.chunks_x * self.chunks_y
    }

    /// Pixel rectangle of one chunk: (x, y, width, height).
    fn rect(&self, format: &ImageFormat, chunk: u32) -> (usize, usize, usize, usize) {
        let start_x = (chunk % self.chunks_x) as usize * RENDER_CHUNK_SIZE;
        let start_y = (chunk / self.chunks_x) as usize * RENDER_CHUNK_SIZE;
        let w = RENDER_CHUNK_SIZE.min(format.width - start_x);
        let h = RENDER_CHUNK_SIZE.min(format.height - start_y);
        (start_x, start_y, w, h)
    }
}

/// Traces and packs one chunk into `out` (tightly packed rows). Returns false
/// when the job was cancelled mid-tile; the contents of `out` are then
/// unspecified.
fn render_chunk(
    scene: &CompositeScene,
    format: &ImageFormat,
    grid: &TileGrid,
    chunk: u32,
    state: &AtomicU8,
    out: &mut Vec<u8>,
) -> bool {
    let bpp = format.bytes_per_pixel();
    let (start_x, start_y, w, h) = grid.rect(format, chunk);
    out.clear();
    out.resize(w * h * bpp, 0);

    for row in 0..h {
        for col in 0..w {
            if state.load(Ordering::Relaxed) != STATE_NORMAL {
                return false;
            }
            let c = scene.calculate_color((start_x + col) as f32, (start_y + row) as f32);
            let off = (row * w + col) * bpp;
            format.pack(c, &mut out[off..off + bpp]);
        }
    }
    true
}

/// Copies a finished chunk into the destination image.
fn blit_chunk(dest: &mut [u8], format: &ImageFormat, grid: &TileGrid, chunk: u32, data: &[u8]) {
    let bpp = format.bytes_per_pixel();
    let (start_x, start_y, w, h) = grid.rect(format, chunk);
    for row in 0..h {
        let src = &data[row * w * bpp..(row + 1) * w * bpp];
        let off = (start_y + row) * format.pitch + start_x * bpp;
        dest[off..off + w * bpp].copy_from_slice(src);
    }
}

// ─── Blocking driver ────────────────────────────────────────────────────────

struct BlockingJob {
    scene: Arc<CompositeScene>,
    format: ImageFormat,
    grid: TileGrid,
    chunk: AtomicU32,
    tiles: Sender<(u32, Vec<u8>)>,
}

struct BlockingSlot {
    seq: u64,
    busy: usize,
    current: Option<Arc<BlockingJob>>,
}

struct BlockingShared {
    state: AtomicU8,
    slot: Mutex<BlockingSlot>,
    start: Condvar,
    finish: Condvar,
}

/// Renders with the calling thread plus `threads` helper workers. Workers
/// hand finished tiles back over a channel; only the caller writes the
/// destination buffer.
pub struct BlockingRenderer {
    shared: Arc<BlockingShared>,
    workers: Vec<JoinHandle<()>>,
}

fn blocking_worker(shared: Arc<BlockingShared>) {
    let mut seen = 0u64;
    loop {
        let job = {
            let mut slot = shared.slot.lock().unwrap();
            loop {
                if shared.state.load(Ordering::Acquire) == STATE_QUIT {
                    return;
                }
                if slot.seq != seen {
                    seen = slot.seq;
                    break slot.current.clone().expect("job sequence advanced without a job");
                }
                slot = shared.start.wait(slot).unwrap();
            }
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut tile = Vec::new();
            loop {
                let chunk = job.chunk.fetch_add(1, Ordering::Relaxed);
                if chunk >= job.grid.total() {
                    break;
                }
                if !render_chunk(&job.scene, &job.format, &job.grid, chunk, &shared.state, &mut tile) {
                    break;
                }
                let _ = job.tiles.send((chunk, std::mem::take(&mut tile)));
            }
        }));
        if let Err(e) = result {
            error!("render worker panicked: {:?}", e.downcast_ref::<&str>());
        }

        let mut slot = shared.slot.lock().unwrap();
        slot.busy -= 1;
        if slot.busy == 0 {
            shared.finish.notify_all();
        }
    }
}

impl BlockingRenderer {
    /// `threads` counts helper workers; `None` uses one fewer than the
    /// hardware parallelism. Zero workers is legal; the caller renders
    /// everything itself.
    pub fn new(threads: Option<usize>) -> Self {
        let n = worker_count(threads, true);
        let shared = Arc::new(BlockingShared {
            state: AtomicU8::new(STATE_NORMAL),
            slot: Mutex::new(BlockingSlot { seq: 0, busy: 0, current: None }),
            start: Condvar::new(),
            finish: Condvar::new(),
        });
        let workers = (0..n)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || blocking_worker(shared))
            })
            .collect();
        BlockingRenderer { shared, workers }
    }

    /// Renders `scene` into `dest`. Returns `Ok(true)` when the image
    /// completed, `Ok(false)` when [`Self::signal_abort`] cut it short.
    pub fn render(&self, dest: &mut [u8], format: &ImageFormat, scene: &Arc<CompositeScene>) -> Result<bool> {
        format.check_buffer(dest)?;
        let grid = TileGrid::of(format);
        let (tx, rx): (Sender<(u32, Vec<u8>)>, Receiver<(u32, Vec<u8>)>) = crossbeam_channel::unbounded();

        let job = Arc::new(BlockingJob {
            scene: scene.clone(),
            format: format.clone(),
            grid,
            chunk: AtomicU32::new(0),
            tiles: tx,
        });

        {
            let mut slot = self.shared.slot.lock().unwrap();
            if slot.busy > 0 {
                return Err(Error::AlreadyRunning);
            }
            self.shared.state.store(STATE_NORMAL, Ordering::Release);
            slot.current = Some(job.clone());
            slot.seq += 1;
            slot.busy = self.workers.len();
            scene.lock();
            self.shared.start.notify_all();
        }
        debug!("render start: {}x{} in {} tiles", format.width, format.height, grid.total());

        // the caller participates in the tile loop and is the only writer of
        // `dest`; worker tiles drain through the channel as they arrive
        let mut tile = Vec::new();
        loop {
            let chunk = job.chunk.fetch_add(1, Ordering::Relaxed);
            if chunk >= grid.total() {
                break;
            }
            if !render_chunk(&job.scene, format, &grid, chunk, &self.shared.state, &mut tile) {
                break;
            }
            blit_chunk(dest, format, &grid, chunk, &tile);

            while let Ok((c, data)) = rx.try_recv() {
                blit_chunk(dest, format, &grid, c, &data);
            }
        }

        {
            let mut slot = self.shared.slot.lock().unwrap();
            while slot.busy > 0 {
                slot = self.shared.finish.wait(slot).unwrap();
            }
            slot.current = None;
        }
        drop(job);

        // every worker send happened before its busy decrement
        while let Ok((c, data)) = rx.try_recv() {
            blit_chunk(dest, format, &grid, c, &data);
        }

        let completed = self.shared.state.load(Ordering::Acquire) == STATE_NORMAL;
        scene.unlock();
        debug!("render {}", if completed { "complete" } else { "aborted" });
        Ok(completed)
    }

    /// Asks a render in flight to stop at the next pixel. Callable from any
    /// thread; the `render` call then returns `Ok(false)`.
    pub fn signal_abort(&self) {
        self.shared.state.store(STATE_CANCEL, Ordering::Release);
    }
}

impl Drop for BlockingRenderer {
    fn drop(&mut self) {
        self.shared.state.store(STATE_QUIT, Ordering::Release);
        {
            let _slot = self.shared.slot.lock().unwrap();
            self.shared.start.notify_all();
        }
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}

// ─── Callback driver ────────────────────────────────────────────────────────

type RenderCallback = Box<dyn FnOnce(Vec<u8>, bool) + Send + 'static>;

struct CallbackJob {
    scene: Arc<CompositeScene>,
    format: ImageFormat,
    grid: TileGrid,
    chunk: AtomicU32,
    buffer: Mutex<Vec<u8>>,
    callback: Mutex<Option<RenderCallback>>,
}

struct CallbackSlot {
    seq: u64,
    busy: usize,
    current: Option<Arc<CallbackJob>>,
}

struct CallbackShared {
    state: AtomicU8,
    slot: Mutex<CallbackSlot>,
    barrier: Condvar,
}

/// Fully asynchronous driver: `begin_render` returns immediately and the
/// worker that finishes the last tile hands the buffer to the callback,
/// with a flag saying whether the image completed or was aborted.
pub struct CallbackRenderer {
    shared: Arc<CallbackShared>,
    workers: Vec<JoinHandle<()>>,
}

fn callback_worker(shared: Arc<CallbackShared>) {
    let mut seen = 0u64;
    loop {
        let job = {
            let mut slot = shared.slot.lock().unwrap();
            loop {
                if shared.state.load(Ordering::Acquire) == STATE_QUIT {
                    return;
                }
                if slot.seq != seen {
                    seen = slot.seq;
                    break slot.current.clone().expect("job sequence advanced without a job");
                }
                slot = shared.barrier.wait(slot).unwrap();
            }
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut tile = Vec::new();
            loop {
                let chunk = job.chunk.fetch_add(1, Ordering::Relaxed);
                if chunk >= job.grid.total() {
                    break;
                }
                if !render_chunk(&job.scene, &job.format, &job.grid, chunk, &shared.state, &mut tile) {
                    break;
                }
                let mut buffer = job.buffer.lock().unwrap();
                blit_chunk(&mut buffer, &job.format, &job.grid, chunk, &tile);
            }
        }));
        if let Err(e) = result {
            error!("render worker panicked: {:?}", e.downcast_ref::<&str>());
        }

        let mut slot = shared.slot.lock().unwrap();
        slot.busy -= 1;
        if slot.busy == 0 {
            // last one out: release the scene, fire the callback outside the
            // lock (it may start the next render), then wake any aborter
            job.scene.unlock();
            let buffer = std::mem::take(&mut *job.buffer.lock().unwrap());
            let callback = job.callback.lock().unwrap().take();
            let completed = shared.state.load(Ordering::Acquire) == STATE_NORMAL;
            slot.current = None;
            drop(slot);

            if let Some(cb) = callback {
                cb(buffer, completed);
            }

            let _slot = shared.slot.lock().unwrap();
            shared.barrier.notify_all();
        }
    }
}

impl CallbackRenderer {
    /// `threads` defaults to the hardware parallelism.
    pub fn new(threads: Option<usize>) -> Self {
        let n = worker_count(threads, false).max(1);
        let shared = Arc::new(CallbackShared {
            state: AtomicU8::new(STATE_NORMAL),
            slot: Mutex::new(CallbackSlot { seq: 0, busy: 0, current: None }),
            barrier: Condvar::new(),
        });
        let workers = (0..n)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || callback_worker(shared))
            })
            .collect();
        CallbackRenderer { shared, workers }
    }

    /// Starts rendering into `dest`, which is returned through `callback`
    /// together with a completion flag once the job finishes or aborts. Fails
    /// with the buffer handed back when a render is already in flight or the
    /// buffer is too small.
    pub fn begin_render<F>(
        &self,
        dest: Vec<u8>,
        format: ImageFormat,
        scene: Arc<CompositeScene>,
        callback: F,
    ) -> std::result::Result<(), (Vec<u8>, Error)>
    where
        F: FnOnce(Vec<u8>, bool) + Send + 'static,
    {
        if let Err(e) = format.check_buffer(&dest) {
            return Err((dest, e));
        }

        let mut slot = self.shared.slot.lock().unwrap();
        if slot.busy > 0 {
            return Err((dest, Error::AlreadyRunning));
        }
        debug_assert_eq!(self.shared.state.load(Ordering::Acquire), STATE_NORMAL);

        let grid = TileGrid::of(&format);
        debug!("async render start: {}x{} in {} tiles", format.width, format.height, grid.total());
        scene.lock();
        slot.current = Some(Arc::new(CallbackJob {
            scene,
            format,
            grid,
            chunk: AtomicU32::new(0),
            buffer: Mutex::new(dest),
            callback: Mutex::new(Some(Box::new(callback))),
        }));
        slot.seq += 1;
        slot.busy = self.workers.len();
        drop(slot);
        self.shared.barrier.notify_all();

        Ok(())
    }

    /// Cancels the render in flight, if any, and blocks until the workers
    /// have quiesced. The job's callback still fires, with `completed`
    /// false.
    pub fn abort_render(&self) {
        let mut slot = self.shared.slot.lock().unwrap();
        if slot.busy > 0 {
            self.shared.state.store(STATE_CANCEL, Ordering::Release);
            self.shared.barrier.notify_all();
            while slot.busy > 0 {
                slot = self.shared.barrier.wait(slot).unwrap();
            }
            self.shared.state.store(STATE_NORMAL, Ordering::Release);
        }
    }
}

impl Drop for CallbackRenderer {
    fn drop(&mut self) {
        self.shared.state.store(STATE_QUIT, Ordering::Release);
        {
            let _slot = self.shared.slot.lock().unwrap();
            self.shared.barrier.notify_all();
        }
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aabb::PrimitivePrototype;
    use crate::math::{Color, Matrix, Vector};
    use crate::pixels::rgb24_channels;
    use crate::primitives::{Material, SolidKind};
    use std::sync::Arc;

    fn test_scene() -> Arc<CompositeScene> {
        let m = Arc::new(Material { color: Color::new(0.8, 0.4, 0.2), ..Material::default() });
        let pp = PrimitivePrototype::solid(SolidKind::Sphere, Matrix::identity(3), Vector::zeros(3), m).unwrap();
        let mut scene = CompositeScene::build(vec![pp]).unwrap();
        let rows: Vec<Vector> = (0..3).map(|i| Vector::axis(3, i, 1.0)).collect();
        scene
            .set_camera(crate::camera::Camera::with_frame(Vector::axis(3, 2, -4.0), &rows).unwrap())
            .unwrap();
        scene.set_view_size(70, 50).unwrap();
        Arc::new(scene)
    }

    fn reference_render(scene: &CompositeScene, format: &ImageFormat) -> Vec<u8> {
        let mut out = vec![0u8; format.required_len()];
        let bpp = format.bytes_per_pixel();
        for y in 0..format.height {
            for x in 0..format.width {
                let c = scene.calculate_color(x as f32, y as f32);
                let off = y * format.pitch + x * bpp;
                format.pack(c, &mut out[off..off + bpp]);
            }
        }
        out
    }

    #[test]
    fn tile_grid_covers_ragged_edges() {
        let format = ImageFormat::new(70, 50, rgb24_channels()).unwrap();
        let grid = TileGrid::of(&format);
        assert_eq!((grid.chunks_x, grid.chunks_y), (3, 2));
        assert_eq!(grid.rect(&format, 2), (64, 0, 6, 32));
        assert_eq!(grid.rect(&format, 5), (64, 32, 6, 18));
    }

    #[test]
    fn multithreaded_matches_pixel_order_reference() {
        let scene = test_scene();
        let format = ImageFormat::new(70, 50, rgb24_channels()).unwrap();
        let expected = reference_render(&scene, &format);

        for threads in [0usize, 3] {
            let renderer = BlockingRenderer::new(Some(threads));
            let mut out = vec![0u8; format.required_len()];
            let completed = renderer.render(&mut out, &format, &scene).unwrap();
            assert!(completed);
            assert_eq!(out, expected, "threads = {threads}");
        }
        assert_eq!(scene.locked(), 0);
    }

    #[test]
    fn render_respects_pitch_padding() {
        let scene = test_scene();
        let format = ImageFormat::new(70, 50, rgb24_channels()).unwrap().with_pitch(256).unwrap();
        let renderer = BlockingRenderer::new(Some(2));
        let mut out = vec![0xAAu8; format.required_len()];
        assert!(renderer.render(&mut out, &format, &scene).unwrap());
        // padding bytes between rows stay untouched
        assert_eq!(out[70 * 3], 0xAA);
        assert_eq!(out[255], 0xAA);
    }

    #[test]
    fn rejects_short_buffers() {
        let scene = test_scene();
        let format = ImageFormat::new(70, 50, rgb24_channels()).unwrap();
        let renderer = BlockingRenderer::new(Some(0));
        let mut out = vec![0u8; 16];
        assert!(matches!(
            renderer.render(&mut out, &format, &scene),
            Err(Error::BufferTooSmall { .. })
        ));
        assert_eq!(scene.locked(), 0);
    }

    #[test]
    fn callback_receives_completed_buffer() {
        let scene = test_scene();
        let format = ImageFormat::new(70, 50, rgb24_channels()).unwrap();
        let expected = reference_render(&scene, &format);

        let renderer = CallbackRenderer::new(Some(2));
        let (tx, rx) = crossbeam_channel::bounded(1);
        renderer
            .begin_render(vec![0u8; format.required_len()], format, scene.clone(), move |buf, done| {
                tx.send((buf, done)).unwrap();
            })
            .unwrap();

        let (buf, done) = rx.recv_timeout(std::time::Duration::from_secs(30)).unwrap();
        assert!(done);
        assert_eq!(buf, expected);
        assert_eq!(scene.locked(), 0);
    }

    #[test]
    fn begin_render_while_busy_fails() {
        let scene = test_scene();
        let format = ImageFormat::new(512, 512, rgb24_channels()).unwrap();

        let renderer = CallbackRenderer::new(Some(2));
        let (tx, rx) = crossbeam_channel::bounded(1);
        renderer
            .begin_render(vec![0u8; format.required_len()], format.clone(), scene.clone(), move |_, done| {
                tx.send(done).unwrap();
            })
            .unwrap();

        let (buf, err) = renderer
            .begin_render(vec![1u8; format.required_len()], format, scene, |_, _| {})
            .unwrap_err();
        assert_eq!(err, Error::AlreadyRunning);
        assert_eq!(buf[0], 1);

        renderer.abort_render();
        assert!(rx.recv_timeout(std::time::Duration::from_secs(30)).is_ok());
    }
}
