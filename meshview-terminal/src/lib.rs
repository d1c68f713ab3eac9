/// Terminal host for the mesh viewer
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self},
};
use meshview_core::session::{ViewerContext, ViewerEvent, ViewerPhase, ViewerSession};
use meshview_core::{Color, LoadState, ModelResource, SurfaceError};
use std::io::{self, stdout, Stdout};
use std::time::{Duration, Instant};

pub mod renderer;

pub use renderer::{AsciiRenderer, CELL_ASPECT};

/// Orbit step per key press, in radians
const ORBIT_STEP: f32 = 0.1;
/// Pan step per key press, in world units
const PAN_STEP: f32 = 0.25;

/// Base colors cycled with `c`
const PALETTE: [(u8, u8, u8); 5] = [
    (0x00, 0xb8, 0xd4),
    (0xff, 0x6d, 0x00),
    (0x76, 0xff, 0x03),
    (0xe0, 0xe0, 0xe0),
    (0xd5, 0x00, 0xf9),
];

/// What a key press asks the viewer to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Quit,
    Orbit { left: f32, up: f32 },
    Pan { dx: f32, dy: f32 },
    Zoom(f32),
    CycleMode,
    CycleColor,
    Reframe,
}

/// Map a key press to a viewer action.
pub fn action_for(key: &KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let action = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Up if shift => Action::Pan { dx: 0.0, dy: PAN_STEP },
        KeyCode::Down if shift => Action::Pan { dx: 0.0, dy: -PAN_STEP },
        KeyCode::Left if shift => Action::Pan { dx: -PAN_STEP, dy: 0.0 },
        KeyCode::Right if shift => Action::Pan { dx: PAN_STEP, dy: 0.0 },
        KeyCode::Char('w') | KeyCode::Up => Action::Orbit { left: 0.0, up: ORBIT_STEP },
        KeyCode::Char('s') | KeyCode::Down => Action::Orbit { left: 0.0, up: -ORBIT_STEP },
        KeyCode::Char('a') | KeyCode::Left => Action::Orbit { left: ORBIT_STEP, up: 0.0 },
        KeyCode::Char('d') | KeyCode::Right => Action::Orbit { left: -ORBIT_STEP, up: 0.0 },
        KeyCode::Char('+') | KeyCode::Char('=') => Action::Zoom(1.0),
        KeyCode::Char('-') | KeyCode::Char('_') => Action::Zoom(-1.0),
        KeyCode::Char('m') => Action::CycleMode,
        KeyCode::Char('c') => Action::CycleColor,
        KeyCode::Char('f') => Action::Reframe,
        _ => return None,
    };
    Some(action)
}

fn palette_color(index: usize) -> Color {
    let (r, g, b) = PALETTE[index % PALETTE.len()];
    Color::from_rgb8(r, g, b)
}

fn next_color(current: Color) -> Color {
    let index = PALETTE
        .iter()
        .position(|&(r, g, b)| current.to_rgb8() == (r, g, b))
        .map_or(0, |i| i + 1);
    palette_color(index)
}

/// Log what the session reported and return the newest failure reason, if any.
fn report_events(events: &[ViewerEvent]) -> Option<&str> {
    let mut failure = None;
    for event in events {
        match event {
            ViewerEvent::Progress(progress) => tracing::trace!(progress, "load progress"),
            ViewerEvent::Ready => tracing::info!("model ready"),
            ViewerEvent::Failed { reason, kind } => {
                tracing::warn!(%reason, ?kind, "viewer reported a failure");
                failure = Some(reason.as_str());
            }
        }
    }
    failure
}

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    session: ViewerSession<AsciiRenderer<Stdout>>,
    running: bool,
    last_failure: Option<String>,
}

impl TerminalApp {
    pub fn open(resource: ModelResource, context: ViewerContext) -> Result<Self, SurfaceError> {
        let session = ViewerSession::open(resource, AsciiRenderer::new(stdout()), context)?;
        Ok(Self {
            session,
            running: true,
            last_failure: None,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        self.session.close();
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        while self.running && self.session.is_running() {
            let frame_start = Instant::now();

            while event::poll(Duration::from_millis(0))? {
                self.handle_event(event::read()?);
            }

            let status = self.status_line();
            self.session.surface_mut().set_status(status);
            self.session.frame();
            let events = self.session.take_events();
            if let Some(reason) = report_events(&events) {
                self.last_failure = Some(reason.to_string());
            }

            std::thread::sleep(self.session.render_loop().remaining(frame_start));
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => {
                if let Some(action) = action_for(&key) {
                    self.apply(action);
                }
            }
            Event::Resize(columns, rows) => {
                self.session
                    .resize(u32::from(columns), u32::from(rows) * CELL_ASPECT);
            }
            _ => {}
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Orbit { left, up } => {
                let (controls, _) = self.session.controls_mut();
                controls.rotate_left(left);
                controls.rotate_up(up);
            }
            Action::Pan { dx, dy } => {
                let (controls, camera) = self.session.controls_mut();
                controls.pan(camera, dx, dy);
            }
            Action::Zoom(steps) => {
                let (controls, _) = self.session.controls_mut();
                controls.zoom(steps);
            }
            Action::CycleMode => {
                let mode = self.session.display_mode().next();
                self.session.set_display_mode(mode);
            }
            Action::CycleColor => {
                let color = next_color(self.session.base_color());
                self.session.set_base_color(color);
            }
            Action::Reframe => {
                self.session.reframe();
            }
        }
    }

    fn status_line(&self) -> String {
        let state = match (self.session.phase(), self.session.load_state()) {
            (ViewerPhase::Loading, LoadState::Loading { progress }) => format!("loading {progress}%"),
            (ViewerPhase::Ready, _) => {
                let triangles = self.session.mesh().map_or(0, |m| m.triangle_count());
                format!("{triangles} triangles")
            }
            (ViewerPhase::Error, _) => match &self.last_failure {
                Some(reason) => format!("error: {reason}"),
                None => "error".to_string(),
            },
            (phase, _) => format!("{phase:?}").to_lowercase(),
        };
        format!(
            "meshview | {} | {} | FPS: {:.1} | WASD/Arrows=Orbit Shift+Arrows=Pan +/-=Zoom M=Mode C=Color F=Frame Q=Quit",
            state,
            self.session.display_mode(),
            self.session.render_loop().fps()
        )
    }
}
