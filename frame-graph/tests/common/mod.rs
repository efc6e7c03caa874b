//! Recording device shared by the frame graph integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use frame_graph::{Barrier, BufferDesc, Device, Extent2d, ImageDesc};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestImage {
    pub id: u32,
    pub extent: Extent2d,
}

impl TestImage {
    /// A caller-owned image; ids from 1000 up never collide with pooled ones.
    pub fn external(id: u32) -> Self {
        Self {
            id: 1000 + id,
            extent: Extent2d::new(800, 600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestBuffer {
    pub id: u32,
    pub size: u64,
}

impl TestBuffer {
    pub fn external(id: u32) -> Self {
        Self { id: 1000 + id, size: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Barrier(Barrier),
    Note(String),
}

#[derive(Debug)]
pub struct TestRecorder {
    pub label: String,
    pub commands: Vec<Command>,
}

impl TestRecorder {
    pub fn note(&mut self, text: impl Into<String>) {
        self.commands.push(Command::Note(text.into()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CreateImage { id: u32, extent: Extent2d },
    DestroyImage { id: u32 },
    CreateBuffer { id: u32 },
    DestroyBuffer { id: u32 },
    Open { label: String },
    Submit { label: String, commands: Vec<Command> },
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub struct TestDevice {
    events: EventLog,
    next_id: u32,
    surface: Extent2d,
}

impl TestDevice {
    pub fn new(width: u32, height: u32) -> (Self, EventLog) {
        let events = EventLog::default();
        let device = Self {
            events: events.clone(),
            next_id: 0,
            surface: Extent2d::new(width, height),
        };
        (device, events)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface = Extent2d::new(width, height);
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl Device for TestDevice {
    type Image = TestImage;
    type Buffer = TestBuffer;
    type Recorder = TestRecorder;

    fn create_image(&mut self, _label: &str, _desc: &ImageDesc, extent: Extent2d) -> TestImage {
        self.next_id += 1;
        self.record(Event::CreateImage {
            id: self.next_id,
            extent,
        });
        TestImage {
            id: self.next_id,
            extent,
        }
    }

    fn create_buffer(&mut self, _label: &str, desc: &BufferDesc) -> TestBuffer {
        self.next_id += 1;
        self.record(Event::CreateBuffer { id: self.next_id });
        TestBuffer {
            id: self.next_id,
            size: desc.size,
        }
    }

    fn destroy_image(&mut self, image: TestImage) {
        self.record(Event::DestroyImage { id: image.id });
    }

    fn destroy_buffer(&mut self, buffer: TestBuffer) {
        self.record(Event::DestroyBuffer { id: buffer.id });
    }

    fn open_command_recorder(&mut self, label: &str) -> TestRecorder {
        self.record(Event::Open {
            label: label.to_string(),
        });
        TestRecorder {
            label: label.to_string(),
            commands: Vec::new(),
        }
    }

    fn record_barrier(&mut self, recorder: &mut TestRecorder, barrier: &Barrier) {
        recorder.commands.push(Command::Barrier(*barrier));
    }

    fn submit(&mut self, recorder: TestRecorder) {
        self.record(Event::Submit {
            label: recorder.label,
            commands: recorder.commands,
        });
    }

    fn output_surface_size(&self) -> Extent2d {
        self.surface
    }
}

/// Labels of submitted recorders, in submission order.
pub fn submitted(events: &EventLog) -> Vec<String> {
    events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Submit { label, .. } => Some(label.clone()),
            _ => None,
        })
        .collect()
}

pub fn created_images(events: &EventLog) -> Vec<(u32, Extent2d)> {
    events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::CreateImage { id, extent } => Some((*id, *extent)),
            _ => None,
        })
        .collect()
}

pub fn destroyed(events: &EventLog) -> Vec<u32> {
    events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::DestroyImage { id } | Event::DestroyBuffer { id } => Some(*id),
            _ => None,
        })
        .collect()
}

pub fn created(events: &EventLog) -> Vec<u32> {
    events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::CreateImage { id, .. } | Event::CreateBuffer { id } => Some(*id),
            _ => None,
        })
        .collect()
}
