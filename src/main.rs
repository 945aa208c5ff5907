//! LIVE QUIZ - unattended trivia show for a portrait live stream.
//! Questions rotate on a fixed clock; the audience votes with gifts.

use std::path::Path;
use std::sync::Arc;

use bevy::{
    audio::{PlaybackMode, Volume},
    prelude::*,
    sprite::Anchor,
};
use rand::prelude::*;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

mod config;
mod cues;
mod error;
mod feed;
mod layout;
mod quiz;
mod show;
mod speech;

use config::Config;
use cues::{Cue, CueBoard};
use error::ShowError;
use feed::GiftEvent;
use layout::{FontMetrics, LayoutRect};
use quiz::slots::{RoundSlots, SLOT_LABELS};
use quiz::{CategoryMode, QuestionPool, QuestionRecord};
use show::{ShowClock, ShowPhase};
use speech::{CommandSynthesizer, NarrationSlot, NarrationState, SpeechSynthesizer};

// SETTINGS
const FRAME_WIDTH: f32 = 1080.0;
const FRAME_HEIGHT: f32 = 1920.0;

// Text boxes, in screen fractions (top-left origin)
const QUESTION_BOX: [f32; 4] = [0.10, 0.12, 0.80, 0.24];
const CARD_X_FRAC: f32 = 0.08;
const CARD_W_FRAC: f32 = 0.84;
const CARD_H_FRAC: f32 = 0.095;
const CARD_TOP_FRAC: f32 = 0.44;
const CARD_GAP_FRAC: f32 = 0.03;

// Progress bar geometry
const BAR_MARGIN_X: f32 = 0.05;
const BAR_MARGIN_Y: f32 = 0.02;
const BAR_H_FRAC: f32 = 0.06;
const BAR_BORDER: f32 = 8.0;

// COLORS
const QUESTION_COLOR: Color = Color::WHITE;
const ANSWER_COLOR: Color = Color::srgb(0.02, 0.02, 0.05);
const CARD_COLORS: [Color; 4] = [
    Color::srgb(1.0, 0.3, 0.4),
    Color::srgb(0.25, 0.6, 1.0),
    Color::srgb(1.0, 0.75, 0.1),
    Color::srgb(0.55, 0.3, 0.95),
];
const REVEAL_GREEN: Color = Color::srgb(0.2, 1.0, 0.5);
const BADGE_COLOR: Color = Color::WHITE;
const BAR_FRAME_COLOR: Color = Color::WHITE;
const BAR_TRACK_COLOR: Color = Color::srgb(0.86, 0.86, 0.86);

// Background palette; advances one entry per round
const PALETTE: [Color; 5] = [
    Color::srgb(1.0, 0.745, 0.043),
    Color::srgb(0.984, 0.337, 0.027),
    Color::srgb(1.0, 0.0, 0.431),
    Color::srgb(0.514, 0.22, 0.925),
    Color::srgb(0.227, 0.525, 1.0),
];
const BG_SHAPE_SIZE: f32 = 50.0;
const BG_SHAPE_SPEED: f32 = 180.0;
const BG_PADDING: f32 = 20.0;
const BG_COLUMNS: usize = 4;
const BG_EVEN_ROWS: usize = 5;

const EFFECT_VOLUME: f32 = 0.5;

// Components
#[derive(Component)]
struct RoundEntity;

#[derive(Component)]
struct AnswerCard {
    label: char,
    base: Color,
}

#[derive(Component)]
struct SlotBadge {
    label: char,
}

#[derive(Component)]
struct ProgressFill;

#[derive(Component)]
struct BgShape {
    speed: f32,
}

#[derive(Component)]
struct MusicSlot;

// Resources
#[derive(Resource)]
struct ShowConfig(Config);

#[derive(Resource)]
struct Pool(QuestionPool);

#[derive(Resource)]
struct ShowRng(StdRng);

#[derive(Resource)]
struct Cues(CueBoard);

#[derive(Resource)]
struct VoteIntake(UnboundedReceiver<GiftEvent>);

/// Kept so the channel stays open when no live feed is configured; an
/// embedded event client clones its sender from here.
#[derive(Resource)]
#[allow(dead_code)]
struct VoteSender(UnboundedSender<GiftEvent>);

#[derive(Resource)]
struct Narration(NarrationSlot);

#[derive(Resource)]
struct Speech(Option<Arc<dyn SpeechSynthesizer>>);

#[derive(Resource)]
struct TokioRuntime(Runtime);

#[derive(Resource)]
struct Metrics(FontMetrics);

#[derive(Resource)]
struct ShowAssets {
    font: Handle<Font>,
    tick: Handle<AudioSource>,
    chime: Handle<AudioSource>,
}

/// The whole show state the frame loop drives.
#[derive(Resource)]
struct Show {
    clock: ShowClock,
    round: u64,
    session_id: String,
    question: Option<QuestionRecord>,
    slots: RoundSlots,
    palette_idx: usize,
}

// Events for audio playback
#[derive(Event)]
struct PlaySoundEvent(SoundCue);

#[derive(Clone, Copy)]
enum SoundCue {
    Tick,
    Chime,
}

/// Creates a rounded rectangle mesh for answer cards
fn create_rounded_rect_mesh(width: f32, height: f32, radius: f32) -> Mesh {
    use bevy::render::mesh::{Indices, PrimitiveTopology};

    let hw = width / 2.0;
    let hh = height / 2.0;
    let r = radius.min(hw).min(hh); // Clamp radius
    let segments = 8; // Segments per corner

    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    // Center vertex
    positions.push([0.0, 0.0, 0.0]);
    uvs.push([0.5, 0.5]);

    // Generate vertices around the rounded rectangle
    let corners = [
        (hw - r, hh - r, 0.0),                          // Top-right
        (-hw + r, hh - r, std::f32::consts::FRAC_PI_2), // Top-left
        (-hw + r, -hh + r, std::f32::consts::PI),       // Bottom-left
        (hw - r, -hh + r, std::f32::consts::PI * 1.5),  // Bottom-right
    ];

    for (cx, cy, start_angle) in corners {
        for i in 0..=segments {
            let angle = start_angle + (i as f32 / segments as f32) * std::f32::consts::FRAC_PI_2;
            let x = cx + r * angle.cos();
            let y = cy + r * angle.sin();
            positions.push([x, y, 0.0]);
            uvs.push([(x / width) + 0.5, (y / height) + 0.5]);
        }
    }

    // Generate triangle fan indices
    let num_outer = positions.len() as u32 - 1;
    for i in 1..=num_outer {
        let next = if i == num_outer { 1 } else { i + 1 };
        indices.extend_from_slice(&[0, i, next]);
    }

    Mesh::new(PrimitiveTopology::TriangleList, default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, uvs)
        .with_inserted_indices(Indices::U32(indices))
}

/// Top-left screen coordinates to Bevy world coordinates.
fn world(x: f32, y: f32) -> Vec2 {
    Vec2::new(x - FRAME_WIDTH / 2.0, FRAME_HEIGHT / 2.0 - y)
}

fn brighten(color: Color, factor: f32) -> Color {
    let c = color.to_srgba();
    Color::srgb(
        (c.red * factor).min(1.0),
        (c.green * factor).min(1.0),
        (c.blue * factor).min(1.0),
    )
}

fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    let font_bytes = match std::fs::read(&config.font_path) {
        Ok(bytes) => bytes,
        Err(e) => fail(&format!(
            "cannot read font {}: {e}",
            config.font_path.display()
        )),
    };
    let metrics = match FontMetrics::from_bytes(font_bytes) {
        Ok(metrics) => metrics,
        Err(e) => fail(&e.to_string()),
    };
    let pool = match QuestionPool::load(&config.questions_dir) {
        Ok(pool) => pool,
        Err(e) => fail(&e.to_string()),
    };

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    // Async side work (live feed, narration) lives on its own runtime.
    let runtime = Runtime::new().expect("Failed to create Tokio runtime");

    let (tx, rx) = feed::vote_channel();
    if let Some(addr) = config.live_feed_addr.clone() {
        runtime.spawn(feed::listen(addr, tx.clone()));
    }

    let speech: Option<Arc<dyn SpeechSynthesizer>> = match &config.tts_command {
        Some(command) => match CommandSynthesizer::new(command, "assets/tts".into()) {
            Ok(synth) => Some(Arc::new(synth)),
            Err(e) => {
                eprintln!("narration disabled: {e}");
                None
            }
        },
        None => None,
    };

    let board = CueBoard::new(music_tracks("assets/sounds/background"));

    let show = Show {
        clock: ShowClock::new(
            config.question_secs,
            config.answer_secs,
            config.remaining_ratio,
        ),
        round: 0,
        session_id: uuid::Uuid::new_v4().to_string(),
        question: None,
        slots: RoundSlots::default(),
        palette_idx: 0,
    };

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "LIVE QUIZ MASTER".into(),
                resolution: (FRAME_WIDTH, FRAME_HEIGHT).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ClearColor(PALETTE[0]))
        .insert_resource(ShowConfig(config))
        .insert_resource(Pool(pool))
        .insert_resource(ShowRng(rng))
        .insert_resource(Cues(board))
        .insert_resource(VoteIntake(rx))
        .insert_resource(VoteSender(tx))
        .insert_resource(Narration(speech::narration_slot()))
        .insert_resource(Speech(speech))
        .insert_resource(TokioRuntime(runtime))
        .insert_resource(Metrics(metrics))
        .insert_resource(show)
        .add_event::<PlaySoundEvent>()
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (
                drain_votes,
                advance_show,
                fire_cues,
                spin_music,
                sync_cards,
                update_progress,
            )
                .chain(),
        )
        .add_systems(Update, (animate_background, handle_sound_events))
        .run();
}

fn fail(message: &str) -> ! {
    eprintln!("livequiz: {message}");
    std::process::exit(1);
}

/// Every playable file in the background music directory, as asset paths.
fn music_tracks(dir: &str) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut tracks: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext == "ogg" || ext == "wav" || ext == "mp3")
        })
        .map(|name| format!("sounds/background/{name}"))
        .collect();
    tracks.sort();
    tracks
}

fn setup(
    mut cmd: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut mats: ResMut<Assets<ColorMaterial>>,
    asset_server: Res<AssetServer>,
    config: Res<ShowConfig>,
    show: Res<Show>,
) {
    info!(
        "show session {} ({}s question / {}s answer)",
        show.session_id, config.0.question_secs, config.0.answer_secs
    );

    // Camera
    cmd.spawn(Camera2d);

    let font = speech::asset_path(&config.0.font_path)
        .map(|p| asset_server.load(p))
        .unwrap_or_default();
    cmd.insert_resource(ShowAssets {
        font,
        tick: asset_server.load("sounds/effects/tick.ogg"),
        chime: asset_server.load("sounds/effects/answer.ogg"),
    });

    // Progress bar: frame, track, then the shrinking fill on top
    let unit = meshes.add(Rectangle::new(1.0, 1.0));
    let outer_w = FRAME_WIDTH * (1.0 - 2.0 * BAR_MARGIN_X);
    let outer_h = FRAME_HEIGHT * BAR_H_FRAC;
    let outer_center = world(FRAME_WIDTH / 2.0, FRAME_HEIGHT * BAR_MARGIN_Y + outer_h / 2.0);

    cmd.spawn((
        Mesh2d(unit.clone()),
        MeshMaterial2d(mats.add(ColorMaterial::from(BAR_FRAME_COLOR))),
        Transform::from_xyz(outer_center.x, outer_center.y, 5.0)
            .with_scale(Vec3::new(outer_w, outer_h, 1.0)),
    ));
    cmd.spawn((
        Mesh2d(unit.clone()),
        MeshMaterial2d(mats.add(ColorMaterial::from(BAR_TRACK_COLOR))),
        Transform::from_xyz(outer_center.x, outer_center.y, 6.0).with_scale(Vec3::new(
            outer_w - BAR_BORDER * 2.0,
            outer_h - BAR_BORDER * 2.0,
            1.0,
        )),
    ));
    cmd.spawn((
        Mesh2d(unit),
        MeshMaterial2d(mats.add(ColorMaterial::from(Color::srgb(0.0, 1.0, 0.0)))),
        Transform::from_xyz(outer_center.x, outer_center.y, 7.0).with_scale(Vec3::new(
            outer_w - BAR_BORDER * 2.0,
            outer_h - BAR_BORDER * 2.0,
            1.0,
        )),
        ProgressFill,
    ));

    // Drifting background shapes: staggered columns sharing one tint that
    // follows the palette round by round.
    let bg_mat = mats.add(ColorMaterial::from(brighten(PALETTE[0], 1.1)));
    let circle = meshes.add(Circle::new(BG_SHAPE_SIZE / 2.0));

    let interval_x = (FRAME_WIDTH - 2.0 * BG_PADDING) / (BG_COLUMNS as f32 - 1.0);
    let interval_y = (FRAME_HEIGHT - 2.0 * BG_PADDING - BG_EVEN_ROWS as f32 * BG_SHAPE_SIZE)
        / (BG_EVEN_ROWS as f32 - 1.0);

    for col in 0..BG_COLUMNS {
        let rows = if col % 2 == 0 {
            BG_EVEN_ROWS
        } else {
            BG_EVEN_ROWS - 1
        };
        for row in 0..rows {
            let stagger = if col % 2 == 0 { 0.0 } else { 0.5 };
            let y = BG_PADDING + (row as f32 + stagger) * (BG_SHAPE_SIZE + interval_y);
            let x = BG_PADDING + col as f32 * interval_x - BG_SHAPE_SIZE;
            let pos = world(x, y);
            cmd.spawn((
                Mesh2d(circle.clone()),
                MeshMaterial2d(bg_mat.clone()),
                Transform::from_xyz(pos.x, pos.y, -10.0),
                BgShape {
                    speed: BG_SHAPE_SPEED,
                },
            ));
        }
    }
}

/// Map keyboard digits and pending gift events onto the current tally.
/// Runs before the clock advances, so a vote never lands on a stale round.
fn drain_votes(
    mut show: ResMut<Show>,
    mut intake: ResMut<VoteIntake>,
    keys: Res<ButtonInput<KeyCode>>,
) {
    const VOTE_KEYS: [KeyCode; 4] = [
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
    ];

    for (idx, key) in VOTE_KEYS.into_iter().enumerate() {
        if keys.just_pressed(key) && !show.slots.record_vote(SLOT_LABELS[idx]) {
            debug!("vote key {key:?} hit no slot this round");
        }
    }

    while let Ok(event) = intake.0.try_recv() {
        match feed::slot_for_gift(&event.gift) {
            Some(label) => {
                for _ in 0..event.repeat_count {
                    show.slots.record_vote(label);
                }
            }
            None => info!("ignoring unknown gift {:?}", event.gift),
        }
    }
}

/// Advance the phase clock; on re-entering Question, rotate the round.
/// Rotation failure is fatal: surface it and stop instead of rendering a
/// corrupt round.
fn advance_show(
    mut cmd: Commands,
    time: Res<Time>,
    mut show: ResMut<Show>,
    mut pool: ResMut<Pool>,
    mut rng: ResMut<ShowRng>,
    mut cues: ResMut<Cues>,
    narration: Res<Narration>,
    speech: Res<Speech>,
    runtime: Res<TokioRuntime>,
    metrics: Res<Metrics>,
    assets: Res<ShowAssets>,
    config: Res<ShowConfig>,
    (mut meshes, mut mats, mut clear): (
        ResMut<Assets<Mesh>>,
        ResMut<Assets<ColorMaterial>>,
        ResMut<ClearColor>,
    ),
    (round_entities, bg_shapes): (
        Query<Entity, With<RoundEntity>>,
        Query<&MeshMaterial2d<ColorMaterial>, With<BgShape>>,
    ),
    mut exit: EventWriter<AppExit>,
) {
    let entered = if show.question.is_none() {
        // First frame bootstraps the first round.
        Some(ShowPhase::Question)
    } else {
        show.clock.tick(time.delta_secs())
    };

    match entered {
        Some(ShowPhase::Question) => {
            let ctx = RotationCtx {
                meshes: &mut meshes,
                mats: &mut mats,
                clear: &mut clear,
                narration: &narration.0,
                speech: &speech.0,
                runtime: &runtime.0,
                metrics: &metrics.0,
                assets: &assets,
                category: config.0.category,
            };
            if let Err(e) = rotate_round(
                &mut cmd,
                ctx,
                &mut *show,
                &mut pool.0,
                &mut rng.0,
                &mut cues.0,
                &round_entities,
                &bg_shapes,
            ) {
                error!("show cannot continue: {e}");
                exit.send(AppExit::error());
            }
        }
        Some(ShowPhase::Answer) => {
            if let Some(correct) = show.slots.correct() {
                info!(
                    "round {} reveal: {} ({} of {} votes)",
                    show.round,
                    correct.text,
                    correct.vote_count,
                    show.slots.total_votes()
                );
            }
        }
        None => {}
    }
}

/// Everything round rotation needs besides the show state itself.
struct RotationCtx<'a> {
    meshes: &'a mut Assets<Mesh>,
    mats: &'a mut Assets<ColorMaterial>,
    clear: &'a mut ClearColor,
    narration: &'a NarrationSlot,
    speech: &'a Option<Arc<dyn SpeechSynthesizer>>,
    runtime: &'a Runtime,
    metrics: &'a FontMetrics,
    assets: &'a ShowAssets,
    category: CategoryMode,
}

#[allow(clippy::too_many_arguments)]
fn rotate_round(
    cmd: &mut Commands,
    ctx: RotationCtx<'_>,
    show: &mut Show,
    pool: &mut QuestionPool,
    rng: &mut StdRng,
    cues: &mut CueBoard,
    round_entities: &Query<Entity, With<RoundEntity>>,
    bg_shapes: &Query<&MeshMaterial2d<ColorMaterial>, With<BgShape>>,
) -> Result<(), ShowError> {
    let category = pool.pick_category(ctx.category, rng);
    let record = pool.next(category, rng)?.clone();

    for entity in round_entities.iter() {
        cmd.entity(entity).despawn();
    }

    show.round += 1;
    // Close out the old tally, then rebuild the slots for the new question.
    show.slots.reset();
    show.slots = RoundSlots::for_question(&record, rng);
    cues.reset_round(rng);

    // Rotate the backdrop with the round.
    show.palette_idx += 1;
    let base = PALETTE[show.palette_idx % PALETTE.len()];
    ctx.clear.0 = base;
    let tint = brighten(base, 1.1);
    for handle in bg_shapes.iter() {
        if let Some(material) = ctx.mats.get_mut(&handle.0) {
            material.color = tint;
        }
    }

    spawn_round_entities(
        cmd,
        ctx.meshes,
        ctx.mats,
        ctx.metrics,
        &ctx.assets.font,
        &record,
        &show.slots,
    );

    if let Some(synth) = ctx.speech {
        let options = show
            .slots
            .iter()
            .map(|s| format!("Option {}: {}.", s.label, s.text))
            .collect::<Vec<_>>()
            .join(" ");
        let question_text = format!("{} {}", record.prompt, options);
        let answer_text = show
            .slots
            .correct()
            .map(|s| format!("The correct answer is {}.", s.text))
            .unwrap_or_default();
        speech::synthesize_round(
            ctx.runtime,
            synth.clone(),
            ctx.narration.clone(),
            show.round,
            question_text,
            answer_text,
        );
    }

    info!(
        "round {}: question {} ({} slots, {} left in {})",
        show.round,
        record.id,
        show.slots.len(),
        pool.remaining(category),
        category,
    );
    show.question = Some(record);
    Ok(())
}

fn spawn_round_entities(
    cmd: &mut Commands,
    meshes: &mut Assets<Mesh>,
    mats: &mut Assets<ColorMaterial>,
    metrics: &FontMetrics,
    font: &Handle<Font>,
    record: &QuestionRecord,
    slots: &RoundSlots,
) {
    // Question block
    let question_rect = LayoutRect::from_fractions(
        QUESTION_BOX[0],
        QUESTION_BOX[1],
        QUESTION_BOX[2],
        QUESTION_BOX[3],
        FRAME_WIDTH,
        FRAME_HEIGHT,
    );
    let question_layout = layout::fit(&record.prompt, question_rect, metrics);
    spawn_words(cmd, &question_layout, font, QUESTION_COLOR);

    // Answer cards
    let card_x = CARD_X_FRAC * FRAME_WIDTH;
    let card_w = CARD_W_FRAC * FRAME_WIDTH;
    let card_h = CARD_H_FRAC * FRAME_HEIGHT;
    let card_mesh = meshes.add(create_rounded_rect_mesh(card_w, card_h, 25.0));
    let badge_mesh = meshes.add(Circle::new(48.0));

    for (idx, slot) in slots.iter().enumerate() {
        let card_top = (CARD_TOP_FRAC + idx as f32 * (CARD_H_FRAC + CARD_GAP_FRAC)) * FRAME_HEIGHT;
        let center = world(card_x + card_w / 2.0, card_top + card_h / 2.0);
        let base = CARD_COLORS[idx % CARD_COLORS.len()];

        cmd.spawn((
            Mesh2d(card_mesh.clone()),
            MeshMaterial2d(mats.add(ColorMaterial::from(base))),
            Transform::from_xyz(center.x, center.y, 0.0),
            AnswerCard {
                label: slot.label,
                base,
            },
            RoundEntity,
        ));

        let badge_center = world(card_x + 75.0, card_top + card_h / 2.0);
        cmd.spawn((
            Mesh2d(badge_mesh.clone()),
            MeshMaterial2d(mats.add(ColorMaterial::from(BADGE_COLOR))),
            Transform::from_xyz(badge_center.x, badge_center.y, 1.0),
            SlotBadge { label: slot.label },
            RoundEntity,
        ));
        cmd.spawn((
            Text2d::new(slot.label.to_string()),
            TextFont {
                font: font.clone(),
                font_size: 48.0,
                ..default()
            },
            TextColor(ANSWER_COLOR),
            Transform::from_xyz(badge_center.x, badge_center.y, 2.0),
            SlotBadge { label: slot.label },
            RoundEntity,
        ));

        let text_rect = LayoutRect {
            x: card_x + 150.0,
            y: card_top + 30.0,
            width: card_w - 190.0,
            height: card_h - 60.0,
        };
        let slot_layout = layout::fit(&slot.text, text_rect, metrics);
        spawn_words(cmd, &slot_layout, font, ANSWER_COLOR);
    }
}

/// Spawn one glyph run per placed word, exactly where the fit put it.
fn spawn_words(
    cmd: &mut Commands,
    text_layout: &layout::TextLayout,
    font: &Handle<Font>,
    color: Color,
) {
    for word in &text_layout.words {
        let pos = world(word.x, word.y);
        cmd.spawn((
            Text2d::new(word.text.clone()),
            TextFont {
                font: font.clone(),
                font_size: text_layout.font_size,
                ..default()
            },
            TextColor(color),
            Anchor::TopLeft,
            Transform::from_xyz(pos.x, pos.y, 2.0),
            RoundEntity,
        ));
    }
}

/// Fire the phase-scoped cues: the countdown tick in the question window's
/// final stretch, and the chime plus narrations, each at most once per round.
fn fire_cues(
    mut cmd: Commands,
    show: Res<Show>,
    mut cues: ResMut<Cues>,
    narration: Res<Narration>,
    speech: Res<Speech>,
    asset_server: Res<AssetServer>,
    mut sounds: EventWriter<PlaySoundEvent>,
) {
    if show.slots.is_empty() {
        return;
    }

    if show.clock.in_tick_window() && cues.0.fire(Cue::Tick) {
        debug!("tick cue at {:.1}s", show.clock.elapsed());
        sounds.send(PlaySoundEvent(SoundCue::Tick));
    }

    if show.clock.phase() == ShowPhase::Answer && cues.0.fire(Cue::Answer) {
        sounds.send(PlaySoundEvent(SoundCue::Chime));
    }

    let due = match show.clock.phase() {
        ShowPhase::Question => Cue::QuestionNarration,
        ShowPhase::Answer => Cue::AnswerNarration,
    };
    if cues.0.has_fired(due) {
        return;
    }

    if speech.0.is_none() {
        cues.0.fire(due);
        return;
    }

    // Non-blocking poll; synthesis may still be running.
    let Ok(guard) = narration.0.try_lock() else {
        return;
    };
    if guard.round != show.round {
        return;
    }
    let state = match due {
        Cue::QuestionNarration => &guard.question,
        _ => &guard.answer,
    };
    match state {
        NarrationState::Ready(path) => {
            match speech::asset_path(path) {
                Some(rel) => {
                    cmd.spawn((
                        AudioPlayer::new(asset_server.load(rel)),
                        PlaybackSettings {
                            mode: PlaybackMode::Despawn,
                            ..default()
                        },
                    ));
                }
                None => warn!(
                    "narration file {} is outside the asset root",
                    path.display()
                ),
            }
            cues.0.fire(due);
        }
        NarrationState::Failed => {
            cues.0.fire(due);
        }
        NarrationState::Pending => {}
    }
}

/// Start this round's background music once, replacing last round's loop.
fn spin_music(
    mut cmd: Commands,
    mut cues: ResMut<Cues>,
    config: Res<ShowConfig>,
    asset_server: Res<AssetServer>,
    playing: Query<Entity, With<MusicSlot>>,
) {
    let Some(track) = cues.0.music_to_start().map(str::to_owned) else {
        return;
    };

    for entity in playing.iter() {
        cmd.entity(entity).despawn();
    }

    info!("background track: {track}");
    cmd.spawn((
        AudioPlayer::new(asset_server.load(track)),
        PlaybackSettings {
            mode: PlaybackMode::Loop,
            volume: Volume::new(config.0.music_volume),
            ..default()
        },
        MusicSlot,
    ));
}

/// Per-frame card visuals: vote fill while voting is open, reveal colors and
/// the enlarged badge on the correct slot during the answer phase.
fn sync_cards(
    show: Res<Show>,
    time: Res<Time>,
    mut mats: ResMut<Assets<ColorMaterial>>,
    cards: Query<(&AnswerCard, &MeshMaterial2d<ColorMaterial>)>,
    mut badges: Query<(&SlotBadge, &mut Transform)>,
) {
    let reveal = show.clock.phase() == ShowPhase::Answer;
    let correct = show.slots.correct().map(|s| s.label);

    for (card, handle) in cards.iter() {
        let Some(material) = mats.get_mut(&handle.0) else {
            continue;
        };
        material.color = if reveal && Some(card.label) == correct {
            REVEAL_GREEN.with_alpha(0.95)
        } else if reveal {
            card.base.with_alpha(0.2)
        } else {
            let level = RoundSlots::fill_level(show.slots.fill_ratio(card.label));
            card.base.with_alpha(level as f32 / 255.0)
        };
    }

    for (badge, mut transform) in badges.iter_mut() {
        if reveal && Some(badge.label) == correct {
            let pulse = 1.35 + (time.elapsed_secs() * 8.0).sin() * 0.08;
            transform.scale = Vec3::splat(pulse);
        } else {
            transform.scale = Vec3::ONE;
        }
    }
}

/// Shrink the fill toward the right edge as the phase runs out, blending
/// green into red.
fn update_progress(
    show: Res<Show>,
    mut mats: ResMut<Assets<ColorMaterial>>,
    mut fill: Query<(&mut Transform, &MeshMaterial2d<ColorMaterial>), With<ProgressFill>>,
) {
    let progress = show.clock.progress();

    let inner_w = FRAME_WIDTH * (1.0 - 2.0 * BAR_MARGIN_X) - BAR_BORDER * 2.0;
    let inner_h = FRAME_HEIGHT * BAR_H_FRAC - BAR_BORDER * 2.0;
    let inner_left = FRAME_WIDTH * BAR_MARGIN_X + BAR_BORDER;
    let inner_top = FRAME_HEIGHT * BAR_MARGIN_Y + BAR_BORDER;

    for (mut transform, handle) in fill.iter_mut() {
        let width = inner_w * (1.0 - progress);
        let center = world(inner_left + width / 2.0, inner_top + inner_h / 2.0);
        transform.translation.x = center.x;
        transform.scale = Vec3::new(width.max(0.0), inner_h, 1.0);

        if let Some(material) = mats.get_mut(&handle.0) {
            material.color = Color::srgb(progress, 1.0 - progress, 0.0);
        }
    }
}

fn animate_background(time: Res<Time>, mut shapes: Query<(&mut Transform, &BgShape)>) {
    for (mut transform, shape) in shapes.iter_mut() {
        transform.translation.x += shape.speed * time.delta_secs();
        if transform.translation.x > FRAME_WIDTH / 2.0 + BG_SHAPE_SIZE {
            transform.translation.x = -FRAME_WIDTH / 2.0 - BG_SHAPE_SIZE;
        }
    }
}

fn handle_sound_events(
    mut cmd: Commands,
    mut events: EventReader<PlaySoundEvent>,
    assets: Option<Res<ShowAssets>>,
) {
    let Some(assets) = assets else { return };

    for event in events.read() {
        let source = match event.0 {
            SoundCue::Tick => assets.tick.clone(),
            SoundCue::Chime => assets.chime.clone(),
        };

        cmd.spawn((
            AudioPlayer::new(source),
            PlaybackSettings {
                mode: PlaybackMode::Despawn,
                volume: Volume::new(EFFECT_VOLUME),
                ..default()
            },
        ));
    }
}
