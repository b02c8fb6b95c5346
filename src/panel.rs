//! Physical and simulated output panels.

use anyhow::{anyhow, Result};
use crossterm::cursor::Show;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use embedded_graphics::prelude::*;
use linux_embedded_hal::I2cdev;
use log::{info, warn};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;
use ssd1306::{mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306};
// Brings `init` into scope; the name itself is taken by our config type
use ssd1306::prelude::DisplayConfig as _;
use std::io::{self, Stdout};

use crate::config::DisplayConfig;
use crate::render::Canvas;
use crate::screen::{HEIGHT, WIDTH};

/// Something a finished [`Canvas`] can be pushed to.
pub trait Panel {
    /// Replaces everything on the panel with `canvas`. Blocks until sent.
    fn display(&mut self, canvas: &Canvas) -> Result<()>;

    /// Turns every pixel off.
    fn clear(&mut self) -> Result<()>;
}

type Oled = Ssd1306<I2CInterface<I2cdev>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

pub struct Ssd1306Panel {
    display: Oled,
}

impl Ssd1306Panel {
    pub fn open(config: &DisplayConfig) -> Result<Self> {
        let device = config.i2c_device();
        info!("Initializing display on {} at 0x{:02X}", device, config.i2c_address);

        let i2c = I2cdev::new(&device).map_err(|e| anyhow!("opening {}: {}", device, e))?;
        let interface = I2CDisplayInterface::new_custom_address(i2c, config.i2c_address);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();

        display
            .init()
            .map_err(|e| anyhow!("initializing SSD1306 on {}: {:?}", device, e))?;
        display.clear_buffer();
        display
            .flush()
            .map_err(|e| anyhow!("first flush to {}: {:?}", device, e))?;

        Ok(Ssd1306Panel { display })
    }
}

impl Panel for Ssd1306Panel {
    fn display(&mut self, canvas: &Canvas) -> Result<()> {
        self.display.clear_buffer();
        self.display
            .draw_iter(canvas.pixels())
            .map_err(|e| anyhow!("drawing to buffer: {:?}", e))?;
        self.display.flush().map_err(|e| anyhow!("I2C flush: {:?}", e))
    }

    fn clear(&mut self) -> Result<()> {
        self.display.clear_buffer();
        self.display.flush().map_err(|e| anyhow!("I2C flush: {:?}", e))
    }
}

/// Draws the canvas in the terminal, two pixel rows per character cell.
pub struct TerminalPanel {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalPanel {
    pub fn open() -> Result<Self> {
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(TerminalPanel { terminal })
    }
}

pub fn half_block_lines(canvas: &Canvas) -> Vec<String> {
    (0..HEIGHT as i32)
        .step_by(2)
        .map(|y| {
            (0..WIDTH as i32)
                .map(|x| match (canvas.get(x, y), canvas.get(x, y + 1)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                })
                .collect()
        })
        .collect()
}

impl Panel for TerminalPanel {
    fn display(&mut self, canvas: &Canvas) -> Result<()> {
        let lines: Vec<Line> = half_block_lines(canvas).into_iter().map(Line::from).collect();
        self.terminal.draw(|f| {
            let wanted = Rect::new(0, 0, WIDTH as u16 + 2, HEIGHT as u16 / 2 + 2);
            let widget = Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("SvxLink display (Ctrl+C to quit)"),
            );
            f.render_widget(widget, f.size().intersection(wanted));
        })?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.display(&Canvas::new())
    }
}

impl Drop for TerminalPanel {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        let _ = self.terminal.backend_mut().execute(LeaveAlternateScreen);
        let _ = io::stdout().execute(Show);
    }
}

/// Owns the panel for the life of the monitor and blanks it on the way out.
///
/// [`PanelGuard::release`] is the normal path. If the guard is dropped
/// without it (an error return, a panic) the release runs from `Drop`.
pub struct PanelGuard {
    panel: Box<dyn Panel>,
    released: bool,
}

impl PanelGuard {
    pub fn new(panel: Box<dyn Panel>) -> Self {
        PanelGuard {
            panel,
            released: false,
        }
    }

    pub fn panel(&mut self) -> &mut dyn Panel {
        self.panel.as_mut()
    }

    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.panel.clear()?;
        self.panel.display(&Canvas::new())
    }
}

impl Drop for PanelGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to blank display on exit: {:#}", e);
        }
    }
}
