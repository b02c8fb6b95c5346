//! Screen layouts.
//!
//! A [`Frame`] is a flat list of draw primitives in painting order. It is
//! rebuilt from scratch every tick and never compared with the previous one.
//! Text is placed as-is; long conference names run past the panel edge.

use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::fonts::Icon;
use crate::status::LinkStatus;
use crate::telemetry::HostTelemetry;

pub const WIDTH: u32 = 128;
pub const HEIGHT: u32 = 64;

// Rectangles are given as inclusive corners
const HEADER: (Point, Point) = (Point::new(0, 0), Point::new(WIDTH as i32, 15));
const TITLE_AT: Point = Point::new(WIDTH as i32 / 2 - 30, 0);

const ROW_1: i32 = 20;
const ROW_2: i32 = 35;

const TX_BOX: (Point, Point) = (Point::new(5, 50), Point::new(60, 64));
const RX_BOX: (Point, Point) = (Point::new(65, 50), Point::new(125, 64));
const TX_ICON_AT: Point = Point::new(15, 52);
const TX_LABEL_AT: Point = Point::new(30, 50);
const RX_ICON_AT: Point = Point::new(75, 50);
const RX_LABEL_AT: Point = Point::new(92, 50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenSelector {
    #[default]
    System,
    Link,
}

impl ScreenSelector {
    pub fn toggled(self) -> Self {
        match self {
            ScreenSelector::System => ScreenSelector::Link,
            ScreenSelector::Link => ScreenSelector::System,
        }
    }
}

/// `On` is a lit pixel; `Off` draws in the background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    FillRect { area: Rectangle, ink: Ink },
    OutlineRect { area: Rectangle, ink: Ink },
    Text { at: Point, text: String, ink: Ink },
    Icon { at: Point, icon: Icon, ink: Ink },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub primitives: Vec<Primitive>,
}

impl Frame {
    fn fill(&mut self, corners: (Point, Point), ink: Ink) {
        self.primitives.push(Primitive::FillRect {
            area: Rectangle::with_corners(corners.0, corners.1),
            ink,
        });
    }

    fn outline(&mut self, corners: (Point, Point), ink: Ink) {
        self.primitives.push(Primitive::OutlineRect {
            area: Rectangle::with_corners(corners.0, corners.1),
            ink,
        });
    }

    fn text(&mut self, at: Point, text: impl Into<String>, ink: Ink) {
        self.primitives.push(Primitive::Text {
            at,
            text: text.into(),
            ink,
        });
    }

    fn icon(&mut self, at: Point, icon: Icon, ink: Ink) {
        self.primitives.push(Primitive::Icon { at, icon, ink });
    }

    /// All text primitives, in drawing order.
    #[cfg(test)]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    #[cfg(test)]
    pub fn icons(&self) -> impl Iterator<Item = (Point, Icon)> + '_ {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Icon { at, icon, .. } => Some((*at, *icon)),
            _ => None,
        })
    }
}

pub fn compose(title: &str, telemetry: &HostTelemetry, status: &LinkStatus, selector: ScreenSelector) -> Frame {
    let mut frame = Frame::default();

    frame.fill(HEADER, Ink::On);
    frame.text(TITLE_AT, title, Ink::Off);

    match selector {
        ScreenSelector::System => {
            frame.icon(Point::new(5, ROW_1), Icon::Wifi, Ink::On);
            frame.text(Point::new(25, ROW_1), telemetry.ip.as_str(), Ink::On);

            frame.icon(Point::new(5, ROW_2), Icon::Processor, Ink::On);
            frame.text(Point::new(25, ROW_2), format!("{:.1}%", telemetry.cpu_percent), Ink::On);

            frame.icon(Point::new(70, ROW_2), Icon::Thermometer, Ink::On);
            frame.text(Point::new(90, ROW_2), telemetry.cpu_temp.as_str(), Ink::On);
        }
        ScreenSelector::Link => {
            frame.icon(Point::new(5, ROW_1), Icon::Antenna, Ink::On);
            frame.text(Point::new(25, ROW_1), status.conference.as_str(), Ink::On);

            frame.icon(Point::new(5, ROW_2), Icon::Microphone, Ink::On);
            frame.text(Point::new(19, ROW_2), status.speaker.as_str(), Ink::On);
        }
    }

    indicator(&mut frame, TX_BOX, TX_ICON_AT, Icon::Tx, TX_LABEL_AT, "TX", status.transmitting());
    indicator(&mut frame, RX_BOX, RX_ICON_AT, Icon::Rx, RX_LABEL_AT, "RX", status.receiving());

    frame
}

// Active box is filled and its contents drawn inverted
fn indicator(
    frame: &mut Frame,
    area: (Point, Point),
    icon_at: Point,
    icon: Icon,
    label_at: Point,
    label: &str,
    active: bool,
) {
    let content = if active {
        frame.fill(area, Ink::On);
        Ink::Off
    } else {
        frame.outline(area, Ink::On);
        Ink::On
    };
    frame.icon(icon_at, icon, content);
    frame.text(label_at, label, content);
}
