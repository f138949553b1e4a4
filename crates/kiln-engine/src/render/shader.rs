use std::cell::Cell;
use std::rc::Rc;

/// Backend-assigned shader program id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

/// Number of scalar parameters a sprite shader can receive.
pub const SHADER_PARAM_COUNT: usize = 4;

/// Shared reference to a shader. Identity is the `Rc` allocation.
pub type ShaderHandle = Rc<Shader>;

/// A custom sprite shader plus its parameter block.
///
/// Writing a parameter marks the shader changed. A changed shader forces the
/// batch controller to flush even when the same shader is already bound, since
/// the open batch was started with the old parameter values.
#[derive(Debug)]
pub struct Shader {
    id: ShaderId,
    name: String,
    params: Cell<[f32; SHADER_PARAM_COUNT]>,
    changed: Cell<bool>,
}

impl Shader {
    pub fn new(id: ShaderId, name: impl Into<String>) -> ShaderHandle {
        Rc::new(Self {
            id,
            name: name.into(),
            params: Cell::new([0.0; SHADER_PARAM_COUNT]),
            changed: Cell::new(false),
        })
    }

    #[inline]
    pub fn id(&self) -> ShaderId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> [f32; SHADER_PARAM_COUNT] {
        self.params.get()
    }

    /// Sets parameter `index`; out-of-range indices are ignored.
    ///
    /// Writing the value already stored does not mark the shader changed.
    pub fn set_param(&self, index: usize, value: f32) {
        let mut params = self.params.get();
        let Some(slot) = params.get_mut(index) else {
            log::debug!("shader '{}': parameter index {index} out of range", self.name);
            return;
        };
        if *slot == value {
            return;
        }
        *slot = value;
        self.params.set(params);
        self.changed.set(true);
    }

    /// `true` when parameters changed since the shader was last bound.
    #[inline]
    pub fn values_changed(&self) -> bool {
        self.changed.get()
    }

    /// Clears the changed flag; called when the shader is bound to a batch.
    #[inline]
    pub fn reset_changed(&self) {
        self.changed.set(false);
    }
}
