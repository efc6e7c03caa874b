mod common;

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use common::{
    Command, Event, TestBuffer, TestDevice, TestImage, created, created_images, destroyed,
    init_logging, submitted,
};
use frame_graph::{
    Access, AccessMask, BufferDesc, CompileError, ExecuteError, Extent2d, FrameGraph,
    FrameGraphConfig, FrameState, ImageDesc, ImageFormat, PipelineStage,
};

fn graph(width: u32, height: u32) -> (FrameGraph<TestDevice>, common::EventLog) {
    init_logging();
    let (device, events) = TestDevice::new(width, height);
    (FrameGraph::new(device), events)
}

fn color() -> ImageDesc {
    ImageDesc::surface(ImageFormat::Rgba8Unorm)
}

/// `gbuffer` writes `color`, `present` samples it into the surface.
fn declare_gbuffer_present(graph: &mut FrameGraph<TestDevice>) {
    graph
        .add_graphics_pass("gbuffer")
        .write_image("color", color(), Access::COLOR_WRITE)
        .unwrap();

    let mut present = graph.add_graphics_pass("present");
    present.read_image("color", Access::FRAGMENT_SAMPLE).unwrap();
    present
        .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
        .unwrap();
}

#[test]
fn gbuffer_then_present() {
    let (mut graph, events) = graph(800, 600);
    declare_gbuffer_present(&mut graph);

    graph.compile_for_surface().unwrap();
    assert_eq!(graph.pass_order(), vec!["gbuffer", "present"]);
    assert!(graph.barriers_for("gbuffer").is_empty());

    let barriers = graph.barriers_for("present");
    assert_eq!(barriers.len(), 1);
    assert_eq!(barriers[0].src_stage, PipelineStage::COLOR_ATTACHMENT_OUTPUT);
    assert_eq!(barriers[0].src_access, AccessMask::COLOR_ATTACHMENT_WRITE);
    assert_eq!(barriers[0].dst_stage, PipelineStage::FRAGMENT_SHADER);
    assert_eq!(barriers[0].dst_access, AccessMask::SHADER_SAMPLED_READ);

    graph.execute().unwrap();
    assert_eq!(submitted(&events), vec!["gbuffer", "present"]);
    assert_eq!(graph.state(), FrameState::Declaring);
}

#[test]
fn independent_readers_share_one_barrier_each() {
    let (mut graph, _events) = graph(800, 600);
    graph
        .add_graphics_pass("a")
        .write_image("r", color(), Access::COLOR_WRITE)
        .unwrap();
    for (pass, output) in [("b", "out_b"), ("c", "out_c")] {
        let mut builder = graph.add_graphics_pass(pass);
        builder.read_image("r", Access::FRAGMENT_SAMPLE).unwrap();
        builder
            .write_external_image(output, TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
    }

    graph.compile(Extent2d::new(800, 600)).unwrap();
    assert_eq!(graph.pass_order(), vec!["a", "b", "c"]);

    for pass in ["b", "c"] {
        let barriers = graph.barriers_for(pass);
        assert_eq!(barriers.len(), 1, "{pass}");
        // Waits on the writer, never on the other reader.
        assert_eq!(barriers[0].src_stage, PipelineStage::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(barriers[0].src_access, AccessMask::COLOR_ATTACHMENT_WRITE);
    }
}

#[test]
fn producers_run_before_consumers() {
    let (mut graph, events) = graph(640, 480);

    // Declared in an order unrelated to the data flow.
    graph
        .add_compute_pass("cull")
        .write_buffer("draws", BufferDesc::new(4096), Access::COMPUTE_WRITE)
        .unwrap();
    graph
        .add_graphics_pass("shadows")
        .write_image(
            "shadow_map",
            ImageDesc::fixed(ImageFormat::Depth32Float, 1024, 1024),
            Access::DEPTH_STENCIL_WRITE,
        )
        .unwrap();
    {
        let mut gbuffer = graph.add_graphics_pass("gbuffer");
        gbuffer.read_buffer("draws", Access::INDIRECT_READ).unwrap();
        gbuffer
            .write_image("albedo", color(), Access::COLOR_WRITE)
            .unwrap();
        gbuffer
            .write_image(
                "depth",
                ImageDesc::surface(ImageFormat::Depth32Float),
                Access::DEPTH_STENCIL_WRITE,
            )
            .unwrap();
    }
    {
        let mut lighting = graph.add_graphics_pass("lighting");
        lighting.read_image("albedo", Access::FRAGMENT_SAMPLE).unwrap();
        lighting.read_image("depth", Access::FRAGMENT_SAMPLE).unwrap();
        lighting
            .read_image("shadow_map", Access::FRAGMENT_SAMPLE)
            .unwrap();
        lighting
            .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
    }

    graph.compile_for_surface().unwrap();
    let order = graph.pass_order();
    let position = |name: &str| order.iter().position(|pass| *pass == name).unwrap();
    assert!(position("cull") < position("gbuffer"));
    assert!(position("gbuffer") < position("lighting"));
    assert!(position("shadows") < position("lighting"));
    assert_eq!(order.len(), 4);

    graph.execute().unwrap();
    assert_eq!(submitted(&events).len(), 4);
}

#[test]
fn callbacks_run_once_after_their_barriers() {
    let (mut graph, events) = graph(800, 600);
    let calls = Rc::new(RefCell::new(Vec::new()));

    {
        let calls = calls.clone();
        let mut gbuffer = graph.add_graphics_pass("gbuffer");
        let handle = gbuffer
            .write_image("color", color(), Access::COLOR_WRITE)
            .unwrap();
        gbuffer.set_callback(move |context| {
            let image = context.image(handle)?;
            assert_eq!(context.image_extent(handle)?, Extent2d::new(800, 600));
            calls.borrow_mut().push(context.pass_name().to_string());
            context.recorder().note(format!("draw into {}", image.id));
            Ok(())
        });
    }
    {
        let calls = calls.clone();
        let mut present = graph.add_graphics_pass("present");
        let handle = present.read_image("color", Access::FRAGMENT_SAMPLE).unwrap();
        let surface = present
            .write_presentation("surface", TestImage::external(7), Access::COLOR_WRITE)
            .unwrap();
        present.set_callback(move |context| {
            assert_eq!(context.image(surface)?.id, 1007);
            context.image(handle)?;
            calls.borrow_mut().push(context.pass_name().to_string());
            context.recorder().note("blit");
            Ok(())
        });
    }

    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();
    assert_eq!(*calls.borrow(), vec!["gbuffer", "present"]);

    let events = events.borrow();
    let present = events
        .iter()
        .find_map(|event| match event {
            Event::Submit { label, commands } if label == "present" => Some(commands.clone()),
            _ => None,
        })
        .unwrap();
    assert!(matches!(present[0], Command::Barrier(_)));
    assert_eq!(present[1], Command::Note("blit".to_string()));
}

#[test]
fn failing_callback_stops_the_frame() {
    let (mut graph, events) = graph(800, 600);
    declare_gbuffer_present(&mut graph);
    graph
        .set_callback(frame_graph::PassId(0), |context| {
            Err(ExecuteError::PassFailed {
                pass: context.pass_name().to_string(),
                message: "pipeline missing".to_string(),
            })
        })
        .unwrap();

    graph.compile_for_surface().unwrap();
    assert!(matches!(
        graph.execute(),
        Err(ExecuteError::PassFailed { .. })
    ));
    assert!(submitted(&events).is_empty());

    // The frame still ended and its instances went back to the pool.
    assert_eq!(graph.state(), FrameState::Declaring);
    assert_eq!(graph.pool_stats().free_images, 1);
}

#[test]
fn explicit_cycle_fails_without_allocating() {
    let (mut graph, events) = graph(800, 600);
    declare_gbuffer_present(&mut graph);
    let gbuffer = frame_graph::PassId(0);
    let present = frame_graph::PassId(1);
    graph.add_dependency(gbuffer, present).unwrap();

    assert!(matches!(
        graph.compile_for_surface(),
        Err(CompileError::CycleDetected { .. })
    ));
    assert!(created(&events).is_empty());
    assert_eq!(graph.execute(), Err(ExecuteError::NotCompiled));
    assert!(submitted(&events).is_empty());
}

#[test]
fn conflicting_in_place_modifications_are_a_cycle() {
    let (mut graph, events) = graph(800, 600);
    graph
        .add_graphics_pass("scene")
        .write_image("color", color(), Access::COLOR_WRITE)
        .unwrap();
    graph
        .add_graphics_pass("tint")
        .read_write_image("color", "tinted", Access::COLOR_READ_WRITE)
        .unwrap();
    graph
        .add_graphics_pass("fade")
        .read_write_image("color", "faded", Access::COLOR_READ_WRITE)
        .unwrap();
    {
        let mut present = graph.add_graphics_pass("present");
        present.read_image("tinted", Access::FRAGMENT_SAMPLE).unwrap();
        present.read_image("faded", Access::FRAGMENT_SAMPLE).unwrap();
        present
            .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
    }

    assert!(matches!(
        graph.compile_for_surface(),
        Err(CompileError::CycleDetected { .. })
    ));
    assert!(created(&events).is_empty());
}

#[test]
fn reading_an_unwritten_name_fails_the_frame() {
    let (mut graph, events) = graph(800, 600);
    {
        let mut present = graph.add_graphics_pass("present");
        // The result is dropped on purpose: compile must still fail.
        let _ = present.read_image("missing", Access::FRAGMENT_SAMPLE);
        present
            .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
    }

    assert_eq!(
        graph.compile_for_surface(),
        Err(CompileError::UnresolvedResource {
            pass: "present".to_string(),
            name: "missing".to_string(),
        })
    );
    assert!(created(&events).is_empty());

    // The failed frame is gone; the next one starts clean.
    assert_eq!(graph.state(), FrameState::Declaring);
    assert_eq!(graph.frame_index(), 1);
    declare_gbuffer_present(&mut graph);
    graph.compile_for_surface().unwrap();
}

#[test]
fn reads_must_follow_their_writer() {
    let (mut graph, _events) = graph(800, 600);
    let early = graph
        .add_graphics_pass("early")
        .read_image("color", Access::FRAGMENT_SAMPLE);
    assert!(matches!(
        early,
        Err(CompileError::UnresolvedResource { .. })
    ));
}

#[test]
fn duplicate_names_are_rejected() {
    let (mut graph, _events) = graph(800, 600);
    graph
        .add_graphics_pass("a")
        .write_image("color", color(), Access::COLOR_WRITE)
        .unwrap();
    let duplicate = graph
        .add_compute_pass("b")
        .write_buffer("color", BufferDesc::new(64), Access::COMPUTE_WRITE);
    assert_eq!(
        duplicate,
        Err(CompileError::DuplicateResourceName {
            pass: "b".to_string(),
            name: "color".to_string(),
        })
    );
    assert!(graph.compile_for_surface().is_err());
}

#[test]
fn access_must_suit_the_pass_kind() {
    let (mut graph, _events) = graph(800, 600);
    let result = graph
        .add_transfer_pass("upload")
        .write_image("color", color(), Access::COLOR_WRITE);
    assert_eq!(
        result,
        Err(CompileError::KindMismatch {
            pass: "upload".to_string(),
            kind: frame_graph::PassKind::Transfer,
            access: Access::COLOR_WRITE,
        })
    );
}

#[test]
fn access_must_suit_the_resource() {
    let (mut graph, _events) = graph(800, 600);
    let mut pass = graph.add_graphics_pass("draw");
    assert!(matches!(
        pass.write_buffer("vertices", BufferDesc::new(64), Access::COLOR_WRITE),
        Err(CompileError::InvalidAccess { usage: "buffer", .. })
    ));
    assert!(matches!(
        pass.write_image("color", color(), Access::FRAGMENT_SAMPLE),
        Err(CompileError::InvalidAccess { usage: "write", .. })
    ));

    pass.write_image("color", color(), Access::COLOR_WRITE)
        .unwrap();
    assert!(matches!(
        pass.read_buffer("color", Access::VERTEX_READ),
        Err(CompileError::ResourceKindMismatch { .. })
    ));
}

#[test]
fn handles_from_an_earlier_frame_are_stale() {
    let (mut graph, _events) = graph(800, 600);
    declare_gbuffer_present(&mut graph);
    let old = graph
        .add_graphics_pass("late")
        .write_image("late_color", color(), Access::COLOR_WRITE)
        .unwrap();
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();

    declare_gbuffer_present(&mut graph);
    let stale = graph
        .add_graphics_pass("reuse")
        .read(old, Access::FRAGMENT_SAMPLE);
    assert_eq!(
        stale,
        Err(CompileError::StaleOrUnknownHandle { handle: old })
    );
    assert_eq!(
        graph.compile_for_surface(),
        Err(CompileError::StaleOrUnknownHandle { handle: old })
    );
}

#[test]
fn reading_by_handle_follows_the_latest_version() {
    let (mut graph, _events) = graph(800, 600);
    let scene = graph
        .add_graphics_pass("scene")
        .write_image("scene", color(), Access::COLOR_WRITE)
        .unwrap();
    graph
        .add_graphics_pass("bloom")
        .read_write_image("scene", "scene_bloom", Access::COLOR_READ_WRITE)
        .unwrap();
    {
        let mut present = graph.add_graphics_pass("present");
        present.read(scene, Access::FRAGMENT_SAMPLE).unwrap();
        present
            .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
    }

    graph.compile_for_surface().unwrap();
    assert_eq!(graph.pass_order(), vec!["scene", "bloom", "present"]);
}

#[test]
fn concurrently_used_images_are_distinct() {
    let (mut graph, _events) = graph(800, 600);
    let seen = Rc::new(RefCell::new(Vec::new()));

    for name in ["a", "b", "c"] {
        let seen = seen.clone();
        let mut pass = graph.add_graphics_pass(name);
        let handle = pass.write_image(name, color(), Access::COLOR_WRITE).unwrap();
        pass.set_callback(move |context| {
            seen.borrow_mut().push(context.image(handle)?.id);
            Ok(())
        });
    }
    {
        let mut present = graph.add_graphics_pass("present");
        for name in ["a", "b", "c"] {
            present.read_image(name, Access::FRAGMENT_SAMPLE).unwrap();
        }
        present
            .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
    }

    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();

    let ids: HashSet<u32> = seen.borrow().iter().copied().collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(graph.pool_stats().free_images, 3);
}

#[test]
fn steady_state_frames_reuse_pooled_instances() {
    let (mut graph, events) = graph(800, 600);
    for _ in 0..5 {
        declare_gbuffer_present(&mut graph);
        graph.compile_for_surface().unwrap();
        graph.execute().unwrap();
    }
    assert_eq!(created(&events).len(), 1);
    assert_eq!(graph.pool_stats().images_created, 1);
    assert_eq!(submitted(&events).len(), 10);
}

/// One frame that writes `name` into a history buffer and exports it.
fn declare_history_writer(
    graph: &mut FrameGraph<TestDevice>,
    name: &str,
    seen: &Rc<RefCell<Vec<u32>>>,
) {
    let desc = BufferDesc::new(256).with_history();
    let seen = seen.clone();
    let mut writer = graph.add_transfer_pass("write");
    let handle = writer
        .write_buffer(name, desc, Access::TRANSFER_WRITE)
        .unwrap();
    writer.set_callback(move |context| {
        seen.borrow_mut().push(context.buffer(handle)?.id);
        Ok(())
    });
    drop(writer);

    let mut export = graph.add_transfer_pass("export");
    export.read_buffer(name, Access::TRANSFER_READ).unwrap();
    export
        .write_external_buffer("readback", TestBuffer::external(0), Access::TRANSFER_WRITE)
        .unwrap();
}

#[test]
fn reading_a_history_handle_reads_the_history_buffer() {
    let (mut graph, _events) = graph(800, 600);
    let desc = BufferDesc::new(256).with_history();
    let previous = graph
        .add_transfer_pass("adapt")
        .read_history_buffer("luma", desc, Access::TRANSFER_READ)
        .unwrap();

    let mut apply = graph.add_transfer_pass("apply");
    let again = apply.read(previous, Access::TRANSFER_READ).unwrap();
    apply
        .write_external_buffer("readback", TestBuffer::external(0), Access::TRANSFER_WRITE)
        .unwrap();
    drop(apply);
    assert_eq!(again, previous);

    graph.compile_for_surface().unwrap();
    assert_eq!(graph.pass_order(), vec!["apply"]);
    graph.execute().unwrap();
}

#[test]
fn history_buffers_are_quarantined_for_one_frame() {
    let (mut graph, _events) = graph(800, 600);
    let seen = Rc::new(RefCell::new(Vec::new()));

    // Frame N releases its history buffer.
    declare_history_writer(&mut graph, "luma", &seen);
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();
    assert_eq!(graph.pool_stats().deferred_buffers, 1);
    assert_eq!(graph.pool_stats().free_buffers, 0);

    // Frame N+1 cannot get it back from the free list.
    declare_history_writer(&mut graph, "other", &seen);
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();

    // Frame N+2 can.
    declare_history_writer(&mut graph, "third", &seen);
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();

    let seen = seen.borrow();
    assert_ne!(seen[1], seen[0]);
    assert_eq!(seen[2], seen[0]);
}

#[test]
fn history_reads_see_last_frames_instance() {
    let (mut graph, _events) = graph(800, 600);
    let desc = BufferDesc::new(256).with_history();
    let written = Rc::new(RefCell::new(Vec::new()));
    let read = Rc::new(RefCell::new(Vec::new()));

    for frame in 0..3 {
        {
            let read = read.clone();
            let mut adapt = graph.add_transfer_pass("adapt");
            let previous = adapt
                .read_history_buffer("exposure", desc, Access::TRANSFER_READ)
                .unwrap();
            adapt.set_callback(move |context| {
                read.borrow_mut().push(context.buffer(previous)?.id);
                Ok(())
            });
        }
        declare_history_writer(&mut graph, "exposure", &written);
        // `adapt` has no sink of its own; tie it to the writer.
        graph
            .add_dependency(frame_graph::PassId(1), frame_graph::PassId(0))
            .unwrap();

        graph.compile_for_surface().unwrap();
        let adapt_barriers = graph.barriers_for("adapt").len();
        if frame == 0 {
            assert_eq!(adapt_barriers, 0);
        } else {
            // Last frame's final transfer write must finish first.
            assert_eq!(adapt_barriers, 1);
        }
        graph.execute().unwrap();
    }

    let written = written.borrow();
    let read = read.borrow();
    assert_eq!(read[1], written[0]);
    assert_eq!(read[2], written[1]);
}

#[test]
fn discarded_frames_keep_history() {
    let (mut graph, _events) = graph(800, 600);
    let desc = BufferDesc::new(256).with_history();
    let written = Rc::new(RefCell::new(Vec::new()));
    declare_history_writer(&mut graph, "exposure", &written);
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();

    graph
        .add_transfer_pass("adapt")
        .read_history_buffer("exposure", desc, Access::TRANSFER_READ)
        .unwrap();
    declare_history_writer(&mut graph, "exposure", &written);
    graph.compile_for_surface().unwrap();
    graph.discard_frame();
    assert_eq!(graph.pool_stats().deferred_buffers, 1);

    let read = Rc::new(RefCell::new(Vec::new()));
    {
        let read = read.clone();
        let mut adapt = graph.add_transfer_pass("adapt");
        let previous = adapt
            .read_history_buffer("exposure", desc, Access::TRANSFER_READ)
            .unwrap();
        adapt
            .write_external_buffer("readback", TestBuffer::external(1), Access::TRANSFER_WRITE)
            .unwrap();
        adapt.set_callback(move |context| {
            read.borrow_mut().push(context.buffer(previous)?.id);
            Ok(())
        });
    }
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();
    assert_eq!(read.borrow()[0], written.borrow()[0]);
}

#[test]
fn resize_replaces_surface_sized_images() {
    let (mut graph, events) = graph(800, 600);
    declare_gbuffer_present(&mut graph);
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();
    let (old_id, old_extent) = created_images(&events)[0];
    assert_eq!(old_extent, Extent2d::new(800, 600));

    graph.device_mut().resize(1024, 768);
    let seen = Rc::new(RefCell::new(None));
    {
        let seen = seen.clone();
        let mut gbuffer = graph.add_graphics_pass("gbuffer");
        let handle = gbuffer
            .write_image("color", color(), Access::COLOR_WRITE)
            .unwrap();
        gbuffer.set_callback(move |context| {
            *seen.borrow_mut() = Some((context.image(handle)?.id, context.image_extent(handle)?));
            Ok(())
        });
    }
    {
        let mut present = graph.add_graphics_pass("present");
        present.read_image("color", Access::FRAGMENT_SAMPLE).unwrap();
        present
            .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
    }
    graph.compile_for_surface().unwrap();
    assert_eq!(graph.compiled_surface(), Extent2d::new(1024, 768));
    graph.execute().unwrap();

    let (new_id, new_extent) = seen.borrow().unwrap();
    assert_ne!(new_id, old_id);
    assert_eq!(new_extent, Extent2d::new(1024, 768));
    assert_eq!(destroyed(&events), vec![old_id]);
}

#[test]
fn fixed_size_images_survive_resize() {
    let (mut graph, events) = graph(800, 600);
    let lut = ImageDesc::fixed(ImageFormat::Rgba16Float, 32, 32);
    for (width, height) in [(800, 600), (1024, 768)] {
        graph
            .add_graphics_pass("bake")
            .write_image("lut", lut, Access::COLOR_WRITE)
            .unwrap();
        let mut present = graph.add_graphics_pass("present");
        present.read_image("lut", Access::FRAGMENT_SAMPLE).unwrap();
        present
            .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
        drop(present);
        graph.compile(Extent2d::new(width, height)).unwrap();
        graph.execute().unwrap();
    }
    assert_eq!(created(&events).len(), 1);
    assert!(destroyed(&events).is_empty());
}

#[test]
fn passes_nothing_depends_on_are_culled() {
    init_logging();
    let (device, events) = TestDevice::new(800, 600);
    let mut graph = FrameGraph::with_config(
        device,
        FrameGraphConfig {
            verbose: true,
            warn_on_culled: true,
        },
    );
    declare_gbuffer_present(&mut graph);
    let ran = Rc::new(RefCell::new(false));
    {
        let ran = ran.clone();
        let mut debug = graph.add_graphics_pass("debug_view");
        debug
            .write_image("debug", color(), Access::COLOR_WRITE)
            .unwrap();
        debug.set_callback(move |_| {
            *ran.borrow_mut() = true;
            Ok(())
        });
    }

    graph.compile_for_surface().unwrap();
    assert_eq!(graph.pass_order(), vec!["gbuffer", "present"]);
    assert_eq!(graph.culled_passes(), vec!["debug_view"]);
    // Only `color` got an instance.
    assert_eq!(created(&events).len(), 1);

    graph.execute().unwrap();
    assert!(!*ran.borrow());
    assert_eq!(submitted(&events), vec!["gbuffer", "present"]);
}

#[test]
fn in_place_modification_does_not_keep_dead_readers_alive() {
    let (mut graph, events) = graph(800, 600);
    graph
        .add_graphics_pass("scene")
        .write_image("color", color(), Access::COLOR_WRITE)
        .unwrap();
    {
        let mut debug = graph.add_graphics_pass("debug_view");
        debug.read_image("color", Access::FRAGMENT_SAMPLE).unwrap();
        debug
            .write_image("debug", color(), Access::COLOR_WRITE)
            .unwrap();
    }
    graph
        .add_graphics_pass("tonemap")
        .read_write_image("color", "toned", Access::COLOR_READ_WRITE)
        .unwrap();
    {
        let mut present = graph.add_graphics_pass("present");
        present.read_image("toned", Access::FRAGMENT_SAMPLE).unwrap();
        present
            .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
    }

    graph.compile_for_surface().unwrap();
    assert_eq!(graph.pass_order(), vec!["scene", "tonemap", "present"]);
    assert_eq!(graph.culled_passes(), vec!["debug_view"]);
    assert_eq!(created_images(&events).len(), 1);

    graph.execute().unwrap();
    assert_eq!(submitted(&events), vec!["scene", "tonemap", "present"]);
}

#[test]
fn execute_requires_compile_and_compile_runs_once() {
    let (mut graph, events) = graph(800, 600);
    declare_gbuffer_present(&mut graph);
    assert_eq!(graph.execute(), Err(ExecuteError::NotCompiled));

    graph.compile_for_surface().unwrap();
    assert_eq!(
        graph.compile_for_surface(),
        Err(CompileError::AlreadyCompiled)
    );
    assert_eq!(
        graph
            .add_graphics_pass("late")
            .write_image("late", color(), Access::COLOR_WRITE),
        Err(CompileError::AlreadyCompiled)
    );

    graph.execute().unwrap();
    assert_eq!(graph.execute(), Err(ExecuteError::NotCompiled));
    assert_eq!(submitted(&events).len(), 2);
}

#[test]
fn external_resources_must_be_supplied_every_frame() {
    let (mut graph, _events) = graph(800, 600);
    declare_gbuffer_present(&mut graph);
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();

    let result = graph
        .add_graphics_pass("overlay")
        .read_write_external("surface", "surface_ui", Access::COLOR_READ_WRITE);
    assert!(matches!(
        result,
        Err(CompileError::UnresolvedResource { .. })
    ));
}

#[test]
fn modifying_the_presentation_moves_it() {
    let (mut graph, _events) = graph(800, 600);
    declare_gbuffer_present(&mut graph);
    graph
        .add_graphics_pass("overlay")
        .read_write_external("surface", "surface_ui", Access::COLOR_READ_WRITE)
        .unwrap();
    assert_eq!(graph.presentation(), Some("surface_ui"));

    graph.compile_for_surface().unwrap();
    assert_eq!(graph.pass_order(), vec!["gbuffer", "present", "overlay"]);

    let overlay = graph.barriers_for("overlay");
    assert_eq!(overlay.len(), 1);
    assert_eq!(overlay[0].src_stage, PipelineStage::COLOR_ATTACHMENT_OUTPUT);
    assert_eq!(
        overlay[0].dst_access,
        AccessMask::COLOR_ATTACHMENT_READ | AccessMask::COLOR_ATTACHMENT_WRITE
    );
}

#[test]
fn imported_resources_barrier_from_their_last_use() {
    let (mut graph, _events) = graph(800, 600);
    graph
        .import_image("albedo_texture", TestImage::external(3), Access::TRANSFER_WRITE)
        .unwrap();
    {
        let mut present = graph.add_graphics_pass("present");
        present
            .read_external("albedo_texture", Access::FRAGMENT_SAMPLE)
            .unwrap();
        present
            .write_presentation("surface", TestImage::external(0), Access::COLOR_WRITE)
            .unwrap();
    }

    graph.compile_for_surface().unwrap();
    let barriers = graph.barriers_for("present");
    assert_eq!(barriers.len(), 1);
    assert_eq!(barriers[0].src_stage, PipelineStage::TRANSFER);
    assert_eq!(barriers[0].src_access, AccessMask::TRANSFER_WRITE);
}

#[test]
fn discarding_returns_instances_without_submitting() {
    let (mut graph, events) = graph(800, 600);
    declare_gbuffer_present(&mut graph);
    graph.compile_for_surface().unwrap();
    graph.discard_frame();
    assert!(submitted(&events).is_empty());
    assert_eq!(graph.pool_stats().free_images, 1);

    declare_gbuffer_present(&mut graph);
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();
    assert_eq!(graph.pool_stats().images_created, 1);
}

#[test]
fn dropping_the_graph_destroys_every_pooled_instance() {
    let (mut graph, events) = graph(800, 600);
    let seen = Rc::new(RefCell::new(Vec::new()));
    declare_history_writer(&mut graph, "luma", &seen);
    graph.compile_for_surface().unwrap();
    graph.execute().unwrap();
    declare_gbuffer_present(&mut graph);
    graph.compile_for_surface().unwrap();

    drop(graph);
    let mut created = created(&events);
    let mut destroyed = destroyed(&events);
    created.sort_unstable();
    destroyed.sort_unstable();
    assert_eq!(created, destroyed);
}
