/// How texel fetches and size queries treat out-of-range mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureClampMode {
    /// Pass the requested level through unchanged.
    #[default]
    None,
    /// Clamp `ld`/`resinfo` levels to the view's level count minus one.
    ClampLod,
}

/// Read-only target toggles for one compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Report `SV_VertexID` relative to the draw's base vertex
    /// (`VertexIndex - BaseVertex`). `SV_InstanceID` always has `BaseInstance`
    /// removed.
    pub apply_base_vertex: bool,
    pub texture_clamp: TextureClampMode,
    /// Zero every `g#` array at the start of a compute dispatch.
    pub zero_init_workgroup_memory: bool,
    /// Target SPIR-V version as `(major, minor)`.
    pub spirv_version: (u8, u8),
    pub entry_point_name: String,
    /// Skip `OpName` debug names.
    pub strip_debug_names: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            apply_base_vertex: false,
            texture_clamp: TextureClampMode::None,
            zero_init_workgroup_memory: false,
            spirv_version: (1, 3),
            entry_point_name: "main".to_owned(),
            strip_debug_names: false,
        }
    }
}
