use crate::api::{GraphicsApi, ImageData};
use crate::uniforms::{UniformValue, set_uniform};
use flyby_common::{ProgramId, TextureId};
use flyby_scene::Texture;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// What the registry remembers about an uploaded texture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureInfo {
    pub id: Option<TextureId>,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// Uploaded textures by name.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    textures: BTreeMap<String, TextureInfo>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload `image` and remember it under `name`. A texture already
    /// registered under that name is shadowed, its GPU copy is not freed.
    pub fn register(
        &mut self,
        api: &mut dyn GraphicsApi,
        name: &str,
        image: &ImageData,
    ) -> TextureInfo {
        let id = api.create_texture(name, image);
        let info = TextureInfo {
            id: Some(id),
            name: name.to_string(),
            width: image.width,
            height: image.height,
        };
        if self.textures.insert(name.to_string(), info.clone()).is_some() {
            warn!(name, "texture registered twice, previous upload leaks");
        }
        debug!(
            name,
            id = id.0,
            width = image.width,
            height = image.height,
            "texture registered"
        );
        info
    }

    /// Info for `name`, or an empty info when nothing is registered under it.
    pub fn info(&self, name: &str) -> TextureInfo {
        self.textures.get(name).cloned().unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&TextureInfo> {
        self.textures.get(name)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureInfo> {
        self.textures.values()
    }

    /// Bind the texture registered as `name` to `unit` and point `sampler` at it.
    pub fn bind_named(
        &self,
        api: &mut dyn GraphicsApi,
        program: ProgramId,
        name: &str,
        sampler: &str,
        unit: u32,
    ) -> bool {
        match self.textures.get(name).and_then(|info| info.id) {
            Some(id) => bind_texture(api, program, id, sampler, unit),
            None => {
                error!(name, "unknown image name");
                false
            }
        }
    }
}

/// Activate `unit`, point the `sampler` uniform of `program` at it and bind
/// `texture` there. Unknown textures are logged and skipped.
pub fn bind_texture(
    api: &mut dyn GraphicsApi,
    program: ProgramId,
    texture: TextureId,
    sampler: &str,
    unit: u32,
) -> bool {
    if !api.is_texture(texture) {
        error!(texture = texture.0, "unknown image id");
        return false;
    }
    api.active_texture(unit);
    set_uniform(api, program, sampler, UniformValue::Int(unit as i32));
    api.bind_texture(texture);
    true
}

/// Bind every texture of a mesh to sequential units starting at 0.
pub fn bind_mesh_textures(api: &mut dyn GraphicsApi, program: ProgramId, textures: &[Texture]) {
    for (unit, texture) in textures.iter().enumerate() {
        bind_texture(
            api,
            program,
            texture.id,
            &texture.uniform_name(unit),
            unit as u32,
        );
    }
}
