//! The backend-neutral drawing command stream.
//!
//! [`Command`] is a tagged sum type rather than a trait object: the backend
//! dispatches on `op` with a `match`, never a vtable. `target_mask` is an
//! owned [`Region`] on the command itself; culling repoints readers at a
//! parallel array (see [`CulledMasks`]) instead of mutating the command.

use crate::backend::ImageHandle;
use crate::geometry::Region;

/// Which logical image a BLIT samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Background,
    Window,
    WindowSaved,
    Shadow,
}

#[derive(Debug, Clone)]
pub struct BlitCommand {
    pub source: Source,
    pub source_image: ImageHandle,
    pub source_mask: Option<MaskRef>,
    pub opacity: f64,
    pub dim: f64,
    pub corner_radius: f64,
    pub border_width: i32,
    pub scale: (f64, f64),
    pub effective_size: (u32, u32),
    pub color_inverted: bool,
    pub max_brightness: f64,
}

#[derive(Debug, Clone)]
pub struct BlurCommand {
    pub source_image: ImageHandle,
    pub blur_context: crate::backend::BlurContextHandle,
    pub opacity: f64,
    pub source_mask: Option<MaskRef>,
}

#[derive(Debug, Clone)]
pub struct FillCommand {
    pub color: crate::backend::Color,
}

#[derive(Debug, Clone)]
pub struct CopyAreaCommand {
    pub source_image: ImageHandle,
}

/// A mask attached to a BLIT/BLUR for clipping purposes: the shadow's
/// inverted clip against the window body (§4.3 Shadow), or a rounded-corner
/// clip on a blurred background.
#[derive(Debug, Clone)]
pub struct MaskRef {
    pub region: Region,
    pub inverted: bool,
    pub corner_radius: f64,
}

#[derive(Debug, Clone)]
pub enum CommandOp {
    Blit(BlitCommand),
    Blur(BlurCommand),
    Fill(FillCommand),
    CopyArea(CopyAreaCommand),
}

/// One entry in a layout's command stream. `target_mask` is the region this
/// command paints into; `opaque_region` (BLIT/COPY_AREA only, conceptually)
/// is the subset of `target_mask` known to be fully opaque, used by the
/// damage engine to shortcut lower layers.
#[derive(Debug, Clone)]
pub struct Command {
    pub origin: (i32, i32),
    pub target_mask: Region,
    pub opaque_region: Region,
    pub op: CommandOp,
}

impl Command {
    pub fn is_blit(&self) -> bool {
        matches!(self.op, CommandOp::Blit(_))
    }

    pub fn is_blur(&self) -> bool {
        matches!(self.op, CommandOp::Blur(_))
    }

    pub fn is_copy_area(&self) -> bool {
        matches!(self.op, CommandOp::CopyArea(_))
    }

    pub fn as_blit(&self) -> Option<&BlitCommand> {
        match &self.op {
            CommandOp::Blit(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_blur(&self) -> Option<&BlurCommand> {
        match &self.op {
            CommandOp::Blur(b) => Some(b),
            _ => None,
        }
    }
}

/// Per-command post-cull masks, stored in a parallel array so that `cull`
/// never destroys a command's original `target_mask` and `uncull` is a
/// pointer swap rather than a recompute.
#[derive(Debug, Clone, Default)]
pub struct CulledMasks {
    masks: Vec<Option<Region>>,
}

impl CulledMasks {
    pub fn reset_for(&mut self, len: usize) {
        self.masks.clear();
        self.masks.resize(len, None);
    }

    pub fn set(&mut self, index: usize, region: Region) {
        self.masks[index] = Some(region);
    }

    /// The effective mask for command `index`: the culled mask if culling has
    /// run, otherwise the command's own `target_mask`.
    pub fn effective<'a>(&'a self, index: usize, commands: &'a [Command]) -> &'a Region {
        match &self.masks[index] {
            Some(region) => region,
            None => &commands[index].target_mask,
        }
    }

    pub fn clear(&mut self) {
        for m in &mut self.masks {
            *m = None;
        }
    }
}

/// A layout's ordered command stream, with a recycling pool so that
/// allocating a new layout's commands does not thrash the allocator every
/// frame.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    pub commands: Vec<Command>,
    pub culled: CulledMasks,
    /// Index into `commands` where layer commands begin; `[0, first_layer_start)`
    /// holds the single BACKGROUND COPY_AREA.
    pub first_layer_start: usize,
}

impl CommandList {
    pub fn clear(&mut self) {
        self.commands.clear();
        self.culled.clear();
        self.first_layer_start = 0;
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Free list of over-allocated [`CommandList`]s. §9's "command list pool":
/// retrieving a list at most half the size of a pooled one reuses it in
/// place (keeping its `Vec` capacity and any region allocations), avoiding
/// the churn of tearing down and rebuilding region structures every frame.
#[derive(Debug, Default)]
pub struct CommandListPool {
    free: Vec<CommandList>,
}

impl CommandListPool {
    pub fn acquire(&mut self, expected_len: usize) -> CommandList {
        if let Some(pos) = self
            .free
            .iter()
            .position(|list| list.commands.capacity() >= expected_len)
        {
            let mut list = self.free.swap_remove(pos);
            list.clear();
            return list;
        }
        CommandList {
            commands: Vec::with_capacity(expected_len),
            culled: CulledMasks::default(),
            first_layer_start: 0,
        }
    }

    pub fn release(&mut self, list: CommandList) {
        if list.commands.capacity() > 0 {
            self.free.push(list);
        }
    }
}
