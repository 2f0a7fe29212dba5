//! `vaultplay`: the desktop front-end. Wires `vaultplay_core`'s decrypt → parse →
//! pipeline engine to a winit/wgpu window (I420 YUV texture) and a cpal audio
//! output stream, and drives the controller from debounced keyboard hotkeys —
//! the external collaborators `spec.md` §1 calls out of scope for the core.
//!
//! Grounded on `na_wmv_player`'s `wmv_player_wgpu` binary (channel-fed renderer,
//! cpal ring-buffer output) and `original_source/main_v4.cpp`'s hotkey loop
//! (per-key debounce intervals, SPACE/arrows/Q bindings).

use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use ringbuf::traits::{Consumer, Producer, Split};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use vaultplay_core::codec::{AacDecoder, HevcDecoder};
use vaultplay_core::context::PlaybackContext;
use vaultplay_core::controller;
use vaultplay_core::error::{PlayerError, Result as PlayerResult};
use vaultplay_core::frame::VideoFrame;
use vaultplay_core::mp4::sample_table::CodecInfo;
use vaultplay_core::presentation::{AudioSink, VideoSink};
use vaultplay_core::{pipeline, open};

#[derive(Parser, Debug)]
#[command(name = "vaultplay", about = "Encrypted-container HEVC/AAC media player")]
struct Args {
    /// Path to the encrypted container.
    path: PathBuf,

    /// Decryption password. Prompted from stdin (no echo suppression) if omitted.
    #[arg(long)]
    password: Option<String>,

    /// Initial volume, 0.0-3.0.
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// Seek to this many milliseconds after opening, before the window appears.
    #[arg(long)]
    seek_ms: Option<u64>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.quiet {
        log::LevelFilter::Error
    } else {
        match args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new().filter_level(level).init();

    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("vaultplay: {e}");
            e.exit_code()
        }
    };
    std::process::exit(exit_code);
}

fn run(args: Args) -> PlayerResult<()> {
    let mut password = match args.password {
        Some(p) => p.into_bytes(),
        None => read_password_from_stdin()?,
    };

    let ctx = open(&args.path, &mut password)?;
    ctx.set_volume(args.volume);

    let CodecInfo::Hevc { width, height, .. } = &ctx.video_track.codec else {
        return Err(PlayerError::MissingTrack);
    };
    let (width, height) = (*width, *height);
    if matches!(&ctx.video_track.codec, CodecInfo::Hevc { nal_units, .. } if nal_units.iter().all(|a| a.is_empty()))
    {
        return Err(PlayerError::MissingHevcParameterSets);
    }
    if matches!(&ctx.audio_track.codec, CodecInfo::Aac { asc_bytes, .. } if asc_bytes.is_empty()) {
        return Err(PlayerError::MissingAudioSpecificConfig);
    }

    let event_loop = EventLoop::new().map_err(|e| PlayerError::WindowInit(e.to_string()))?;
    let window = WindowBuilder::new()
        .with_title("vaultplay")
        .with_inner_size(winit::dpi::LogicalSize::new(width.max(1), height.max(1)))
        .build(&event_loop)
        .map_err(|e| PlayerError::WindowInit(e.to_string()))?;

    let renderer = pollster::block_on(Renderer::new(window, width, height))
        .map_err(|e| PlayerError::RendererInit(e.to_string()))?;

    let (video_tx, video_rx) = crossbeam_channel::bounded::<VideoFrame>(4);
    let video_sink = ChannelVideoSink(video_tx);

    let CodecInfo::Aac {
        sample_rate,
        channels,
        ..
    } = &ctx.audio_track.codec
    else {
        return Err(PlayerError::MissingTrack);
    };
    let (audio_output, audio_sink) =
        AudioOutput::open(*sample_rate, *channels as usize).map_err(|e| PlayerError::AudioInit(e.to_string()))?;

    let workers = spawn_workers(ctx.clone(), video_sink, audio_sink);

    controller::play(&ctx);
    if let Some(seek_ms) = args.seek_ms {
        controller::seek(&ctx, seek_ms as i64);
    }

    run_event_loop(event_loop, ctx.clone(), renderer, video_rx, audio_output);

    controller::stop(&ctx);
    for handle in workers {
        let _ = handle.join();
    }
    Ok(())
}

/// Reads one line from stdin as the password; an empty line is rejected by
/// `open()` with `PlayerError::EmptyPassword`, matching exit code 2.
fn read_password_from_stdin() -> PlayerResult<Vec<u8>> {
    print!("password: ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(PlayerError::Io)?;
    Ok(line.trim_end_matches(['\n', '\r']).as_bytes().to_vec())
}

struct WorkerHandles(Vec<thread::JoinHandle<()>>);

impl IntoIterator for WorkerHandles {
    type Item = thread::JoinHandle<()>;
    type IntoIter = std::vec::IntoIter<thread::JoinHandle<()>>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Spawns the six long-running pipeline workers `spec.md` §5 describes: one
/// reader+decoder/pacer/presenter triple per track. Decoders are opened here,
/// under `system-codecs`, against the real `libde265`/`fdk-aac` bindings; the
/// stub used otherwise fails the first `push_init_data`/`config_raw` call so
/// a build without the system libraries still starts up and reports a clear
/// codec error instead of silently producing no frames.
fn spawn_workers(
    ctx: Arc<PlaybackContext>,
    mut video_sink: impl VideoSink + 'static,
    mut audio_sink: impl AudioSink + 'static,
) -> WorkerHandles {
    let mut handles = Vec::with_capacity(6);

    let v_ctx = ctx.clone();
    handles.push(thread::spawn(move || {
        let mut decoder = open_hevc_decoder();
        pipeline::video::reader_decoder_loop(&v_ctx, decoder.as_mut());
    }));

    let v_ctx = ctx.clone();
    handles.push(thread::spawn(move || pipeline::video::pacer_loop(&v_ctx)));

    let v_ctx = ctx.clone();
    handles.push(thread::spawn(move || {
        pipeline::video::presenter_loop(&v_ctx, &mut video_sink);
    }));

    let a_ctx = ctx.clone();
    handles.push(thread::spawn(move || {
        let mut decoder = open_aac_decoder();
        pipeline::audio::reader_decoder_loop(&a_ctx, decoder.as_mut());
    }));

    let a_ctx = ctx.clone();
    handles.push(thread::spawn(move || pipeline::audio::pacer_loop(&a_ctx)));

    let a_ctx = ctx;
    handles.push(thread::spawn(move || {
        pipeline::audio::presenter_loop(&a_ctx, &mut audio_sink);
    }));

    WorkerHandles(handles)
}

#[cfg(feature = "system-codecs")]
fn open_hevc_decoder() -> Box<dyn HevcDecoder> {
    match vaultplay_core::codec::ffi::Libde265Decoder::new() {
        Ok(d) => Box::new(d),
        Err(e) => {
            log::error!("{e}");
            Box::new(UnavailableHevcDecoder)
        }
    }
}

#[cfg(not(feature = "system-codecs"))]
fn open_hevc_decoder() -> Box<dyn HevcDecoder> {
    log::error!("built without `system-codecs`: no HEVC decoder available");
    Box::new(UnavailableHevcDecoder)
}

#[cfg(feature = "system-codecs")]
fn open_aac_decoder() -> Box<dyn AacDecoder> {
    match vaultplay_core::codec::ffi::FdkAacDecoder::new() {
        Ok(d) => Box::new(d),
        Err(e) => {
            log::error!("{e}");
            Box::new(UnavailableAacDecoder)
        }
    }
}

#[cfg(not(feature = "system-codecs"))]
fn open_aac_decoder() -> Box<dyn AacDecoder> {
    log::error!("built without `system-codecs`: no AAC decoder available");
    Box::new(UnavailableAacDecoder)
}

/// Placeholder decoder for builds without `system-codecs`: every call reports
/// a codec error, which the reader+decoder loop logs and returns on, per the
/// "Startup errors are fatal" / "per-sample codec errors are recoverable"
/// split in `spec.md` §7 — here the whole track is simply silent.
struct UnavailableHevcDecoder;

impl HevcDecoder for UnavailableHevcDecoder {
    fn push_data(&mut self, _annex_b: &[u8], _pts_ms: u64) -> PlayerResult<()> {
        Err(PlayerError::Codec("no HEVC decoder available".into()))
    }
    fn push_init_data(&mut self, _annex_b: &[u8]) -> PlayerResult<()> {
        Err(PlayerError::Codec("no HEVC decoder available".into()))
    }
    fn decode_step(&mut self) -> PlayerResult<bool> {
        Ok(false)
    }
    fn next_picture(&mut self) -> Option<VideoFrame> {
        None
    }
    fn reset(&mut self) {}
}

struct UnavailableAacDecoder;

impl AacDecoder for UnavailableAacDecoder {
    fn config_raw(&mut self, _asc: &[u8]) -> PlayerResult<()> {
        Err(PlayerError::Codec("no AAC decoder available".into()))
    }
    fn fill(&mut self, _data: &[u8]) -> PlayerResult<()> {
        Err(PlayerError::Codec("no AAC decoder available".into()))
    }
    fn decode_frame(&mut self) -> PlayerResult<Option<vaultplay_core::codec::AacDecoded>> {
        Ok(None)
    }
}

/// Forwards decoded pictures to the event-loop thread, which owns the wgpu
/// surface. wgpu/winit want surface operations on the thread that created the
/// window, so presentation is split: this sink (running on the presenter
/// worker) just hands frames across a channel; `run_event_loop` uploads and
/// presents them on `RedrawRequested`, matching `wmv_player_wgpu`'s
/// `video_tx`/`video_rx` split.
struct ChannelVideoSink(crossbeam_channel::Sender<VideoFrame>);

impl VideoSink for ChannelVideoSink {
    fn present(&mut self, frame: &VideoFrame) -> PlayerResult<()> {
        let _ = self.0.send(frame.clone());
        Ok(())
    }
}

/// Debounced digital hotkey, mirroring `original_source/utils.h`'s `button_t`:
/// a key reads as "pressed" at most once per `interval`.
struct DebouncedKey {
    code: KeyCode,
    interval: Duration,
    last_fire: Option<Instant>,
    down: bool,
}

impl DebouncedKey {
    fn new(code: KeyCode, interval_ms: u64) -> Self {
        Self {
            code,
            interval: Duration::from_millis(interval_ms),
            last_fire: None,
            down: false,
        }
    }

    fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };
        if code != self.code {
            return false;
        }
        match event.state {
            ElementState::Pressed => {
                self.down = true;
                let now = Instant::now();
                let fire = self
                    .last_fire
                    .map(|t| now.duration_since(t) >= self.interval)
                    .unwrap_or(true);
                if fire {
                    self.last_fire = Some(now);
                }
                fire
            }
            ElementState::Released => {
                self.down = false;
                false
            }
        }
    }
}

fn run_event_loop(
    event_loop: EventLoop<()>,
    ctx: Arc<PlaybackContext>,
    mut renderer: Renderer,
    video_rx: crossbeam_channel::Receiver<VideoFrame>,
    _audio_output: AudioOutput,
) {
    let mut ck_quit = DebouncedKey::new(KeyCode::KeyQ, 10);
    let mut ck_pause = DebouncedKey::new(KeyCode::Space, 150);
    let mut ck_vup = DebouncedKey::new(KeyCode::ArrowUp, 100);
    let mut ck_vdown = DebouncedKey::new(KeyCode::ArrowDown, 100);
    let mut ck_lseek = DebouncedKey::new(KeyCode::ArrowLeft, 300);
    let mut ck_rseek = DebouncedKey::new(KeyCode::ArrowRight, 300);

    let stopped = Arc::new(AtomicBool::new(false));

    let _ = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if ctx.is_stopped() {
            elwt.exit();
            return;
        }

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    stopped.store(true, Ordering::Relaxed);
                    elwt.exit();
                }
                WindowEvent::Resized(size) => renderer.resize(size.width, size.height),
                WindowEvent::KeyboardInput { event, .. } => {
                    if ck_quit.on_key_event(&event) {
                        controller::stop(&ctx);
                        elwt.exit();
                        return;
                    }
                    if ck_pause.on_key_event(&event) {
                        use vaultplay_core::context::PlaybackState;
                        if ctx.state.load() == PlaybackState::Playing {
                            controller::pause(&ctx);
                        } else if ctx.state.load() == PlaybackState::Paused {
                            controller::resume(&ctx);
                        }
                    }
                    if ck_vup.on_key_event(&event) {
                        ctx.set_volume(ctx.volume() + 0.1);
                    }
                    if ck_vdown.on_key_event(&event) {
                        ctx.set_volume(ctx.volume() - 0.1);
                    }
                    if ck_lseek.on_key_event(&event) {
                        let ctx = ctx.clone();
                        thread::spawn(move || controller::seek(&ctx, -1000));
                    }
                    if ck_rseek.on_key_event(&event) {
                        let ctx = ctx.clone();
                        thread::spawn(move || controller::seek(&ctx, 1000));
                    }
                }
                WindowEvent::RedrawRequested => {
                    while let Ok(frame) = video_rx.try_recv() {
                        renderer.upload_frame(&frame);
                    }
                    if let Err(e) = renderer.render() {
                        log::warn!("render failed: {e}");
                    }
                }
                _ => {}
            },
            Event::AboutToWait => renderer.request_redraw(),
            _ => {}
        }
    });
}

/// cpal output stream fed from a lock-free ring buffer of interleaved s16
/// PCM. Grounded on `wmv_player_wgpu`'s `AudioOutput`, adapted from f32 to
/// s16 to match `spec.md` §6's `put_audio_stream_data` contract directly.
struct AudioOutput {
    _stream: cpal::Stream,
}

struct RingAudioSink {
    producer: ringbuf::HeapProd<i16>,
}

impl AudioSink for RingAudioSink {
    fn submit(&mut self, pcm: &[i16]) -> PlayerResult<()> {
        for &s in pcm {
            let _ = self.producer.try_push(s);
        }
        Ok(())
    }
}

impl AudioOutput {
    fn open(sample_rate: u32, channels: usize) -> anyhow::Result<(Self, RingAudioSink)> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no default audio output device")?;
        let mut supported = device.supported_output_configs()?.collect::<Vec<_>>();
        supported.sort_by_key(|c| c.channels() != channels as u16);
        let range = supported.first().context("no supported output config")?;
        let rate = sample_rate.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
        let config = range.with_sample_rate(cpal::SampleRate(rate));
        let stream_config: cpal::StreamConfig = config.clone().into();

        let cap = (rate as usize).saturating_mul(channels).saturating_mul(2).max(4096);
        let rb = ringbuf::HeapRb::<i16>::new(cap);
        let (producer, mut consumer) = rb.split();
        let err_fn = |e| log::error!("audio stream error: {e}");

        let stream = match config.sample_format() {
            cpal::SampleFormat::I16 => device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _| {
                    for s in data {
                        *s = consumer.try_pop().unwrap_or(0);
                    }
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    for s in data {
                        *s = consumer.try_pop().unwrap_or(0) as f32 / 32768.0;
                    }
                },
                err_fn,
                None,
            )?,
            other => anyhow::bail!("unsupported output sample format: {other:?}"),
        };
        stream.play()?;

        Ok((Self { _stream: stream }, RingAudioSink { producer }))
    }
}

/// wgpu renderer: uploads I420 planes into three `R8Unorm` textures and
/// composites them to RGB in a fragment shader. Grounded on
/// `wmv_player_wgpu::Renderer`; the plane upload here walks the frame's own
/// per-plane strides instead of assuming a tightly packed width, since
/// `vaultplay_core::frame::VideoFrame` carries strides explicitly.
struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    tex_y: wgpu::Texture,
    tex_u: wgpu::Texture,
    tex_v: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    video_w: u32,
    video_h: u32,
    window: winit::window::Window,
}

impl Renderer {
    async fn new(window: winit::window::Window, video_w: u32, video_h: u32) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface_tmp = instance.create_surface(&window)?;
        // SAFETY: `window` is kept alive in this struct for as long as `surface` is.
        let surface: wgpu::Surface<'static> = unsafe { std::mem::transmute(surface_tmp) };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps.formats[0];
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: caps.present_modes[0],
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("yuv_sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let (tex_y, view_y) = Self::make_plane_tex(&device, video_w, video_h, "Y");
        let (tex_u, view_u) = Self::make_plane_tex(&device, video_w.div_ceil(2), video_h.div_ceil(2), "U");
        let (tex_v, view_v) = Self::make_plane_tex(&device, video_w.div_ceil(2), video_h.div_ceil(2), "V");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("yuv_shader"),
            source: wgpu::ShaderSource::Wgsl(YUV_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("yuv_bgl"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("yuv_bg"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view_y) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&view_u) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&view_v) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(&sampler) },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("yuv_pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("yuv_pipe"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState { module: &shader, entry_point: "vs_main", buffers: &[] },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            tex_y,
            tex_u,
            tex_v,
            bind_group,
            video_w,
            video_h,
            window,
        })
    }

    fn request_redraw(&self) {
        self.window.request_redraw();
    }

    fn resize(&mut self, w: u32, h: u32) {
        let (w, h) = (w.max(1), h.max(1));
        if self.config.width == w && self.config.height == h {
            return;
        }
        self.config.width = w;
        self.config.height = h;
        self.surface.configure(&self.device, &self.config);
    }

    fn upload_frame(&mut self, frame: &VideoFrame) {
        if frame.width != self.video_w || frame.height != self.video_h {
            return;
        }
        Self::upload_plane(&self.queue, &self.tex_y, self.video_w, self.video_h, &frame.planes[0], frame.strides[0]);
        Self::upload_plane(
            &self.queue,
            &self.tex_u,
            frame.chroma_width(),
            frame.chroma_height(),
            &frame.planes[1],
            frame.strides[1],
        );
        Self::upload_plane(
            &self.queue,
            &self.tex_v,
            frame.chroma_width(),
            frame.chroma_height(),
            &frame.planes[2],
            frame.strides[2],
        );
    }

    fn upload_plane(queue: &wgpu::Queue, tex: &wgpu::Texture, w: u32, h: u32, data: &[u8], src_stride: usize) {
        if w == 0 || h == 0 || data.len() < src_stride * h as usize {
            return;
        }
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(src_stride as u32),
                rows_per_image: Some(h),
            },
            wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
        );
    }

    fn render(&mut self) -> anyhow::Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(f) => f,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => return Ok(()),
            Err(e) => anyhow::bail!("surface error: {e:?}"),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("render") });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(wgpu::Color::BLACK), store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.draw(0..4, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }

    fn make_plane_tex(device: &wgpu::Device, w: u32, h: u32, label: &str) -> (wgpu::Texture, wgpu::TextureView) {
        let tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("plane_{label}")),
            size: wgpu::Extent3d { width: w.max(1), height: h.max(1), depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = tex.create_view(&wgpu::TextureViewDescriptor::default());
        (tex, view)
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

const YUV_SHADER: &str = r#"
struct VSOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) idx: u32) -> VSOut {
    var positions = array<vec2<f32>, 4>(
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, -1.0),
        vec2<f32>(-1.0, 1.0), vec2<f32>(1.0, 1.0),
    );
    var uvs = array<vec2<f32>, 4>(
        vec2<f32>(0.0, 1.0), vec2<f32>(1.0, 1.0),
        vec2<f32>(0.0, 0.0), vec2<f32>(1.0, 0.0),
    );
    var out: VSOut;
    out.pos = vec4<f32>(positions[idx], 0.0, 1.0);
    out.uv = uvs[idx];
    return out;
}

@group(0) @binding(0) var tex_y: texture_2d<f32>;
@group(0) @binding(1) var tex_u: texture_2d<f32>;
@group(0) @binding(2) var tex_v: texture_2d<f32>;
@group(0) @binding(3) var samp: sampler;

fn yuv_to_rgb(y: f32, u: f32, v: f32) -> vec3<f32> {
    let uu = u - 0.5;
    let vv = v - 0.5;
    let r = y + 1.402 * vv;
    let g = y - 0.344136 * uu - 0.714136 * vv;
    let b = y + 1.772 * uu;
    return vec3<f32>(r, g, b);
}

@fragment
fn fs_main(in: VSOut) -> @location(0) vec4<f32> {
    let y = textureSample(tex_y, samp, in.uv).r;
    let u = textureSample(tex_u, samp, in.uv).r;
    let v = textureSample(tex_v, samp, in.uv).r;
    let rgb = clamp(yuv_to_rgb(y, u, v), vec3<f32>(0.0), vec3<f32>(1.0));
    return vec4<f32>(rgb, 1.0);
}
"#;
