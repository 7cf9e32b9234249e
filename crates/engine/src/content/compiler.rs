use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::app::{Pose, Vec3};
use crate::AppPaths;

use super::database::{
    DefDatabase, HazardDef, HazardDefId, HazardKind, ImmunityRule, PlayerDef, PlayerDefId,
};
use super::discovery::discover_mod_sources;
use super::types::{ContentPlanError, ContentPlanRequest};

const PLAYER_DEF_TAG: &str = "PlayerDef";
const HAZARD_DEF_TAG: &str = "HazardDef";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
enum PendingDef {
    Player(PlayerDef),
    Hazard(HazardDef),
}

impl PendingDef {
    fn def_name(&self) -> &str {
        match self {
            Self::Player(def) => &def.def_name,
            Self::Hazard(def) => &def.def_name,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::Player(_) => PLAYER_DEF_TAG,
            Self::Hazard(_) => HAZARD_DEF_TAG,
        }
    }
}

/// Parsing context for one XML file.
struct DefSource<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl DefSource<'_, '_> {
    fn error_at(&self, code: ContentErrorCode, message: String, node: Node<'_, '_>) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{}> must not be empty", field_name),
                node,
            ));
        }
        Ok(value)
    }

    fn parse_u32(&self, node: Node<'_, '_>, field_name: &str) -> Result<u32, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value.parse::<u32>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{} '{}' is not a valid non-negative integer", field_name, value),
                node,
            )
        })
    }

    fn parse_f32(&self, node: Node<'_, '_>, field_name: &str) -> Result<f32, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        let parsed = value.parse::<f32>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{} '{}' is not a valid number", field_name, value),
                node,
            )
        })?;
        if !parsed.is_finite() {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{} must be finite", field_name),
                node,
            ));
        }
        Ok(parsed)
    }

    fn parse_bool(&self, node: Node<'_, '_>, field_name: &str) -> Result<bool, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{} '{}' must be true or false", field_name, value),
                node,
            )),
        }
    }

    fn parse_vec3(&self, node: Node<'_, '_>, field_name: &str) -> Result<Vec3, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>();
        match parts.as_deref() {
            Ok([x, y, z]) if x.is_finite() && y.is_finite() && z.is_finite() => {
                Ok(Vec3::new(*x, *y, *z))
            }
            _ => Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{} '{}' must be three finite numbers 'x,y,z'", field_name, value),
                node,
            )),
        }
    }

    fn missing(&self, field_name: &str, tag: &str, node: Node<'_, '_>) -> ContentCompileError {
        self.error_at(
            ContentErrorCode::MissingField,
            format!("missing required field <{}> in <{}>", field_name, tag),
            node,
        )
    }

    /// Rejects repeated child elements and yields the rest in document order.
    fn unique_fields<'n, 'i>(
        &self,
        node: Node<'n, 'i>,
        tag: &str,
    ) -> Result<Vec<Node<'n, 'i>>, ContentCompileError> {
        let mut seen = HashSet::<&str>::new();
        let mut fields = Vec::new();
        for field in node.children().filter(|child| child.is_element()) {
            let field_name = field.tag_name().name();
            if !seen.insert(field_name) {
                return Err(self.error_at(
                    ContentErrorCode::DuplicateField,
                    format!("duplicate field <{}> in <{}>", field_name, tag),
                    field,
                ));
            }
            fields.push(field);
        }
        Ok(fields)
    }

    fn unknown_field(&self, field: Node<'_, '_>, tag: &str) -> ContentCompileError {
        self.error_at(
            ContentErrorCode::UnknownField,
            format!("unknown field <{}> in <{}>", field.tag_name().name(), tag),
            field,
        )
    }
}

pub fn compile_def_database(
    app_paths: &AppPaths,
    request: &ContentPlanRequest,
) -> Result<DefDatabase, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;

    let mut players = BTreeMap::<String, PlayerDef>::new();
    let mut hazards = BTreeMap::<String, HazardDef>::new();

    for source in sources {
        let xml_files = collect_xml_files_sorted(&source.source_dir)
            .map_err(|error| read_error(&source.mod_id, error.path, error.source))?;
        let mut seen_in_mod = HashSet::<(&'static str, String)>::new();

        for xml_file in xml_files {
            let raw = fs::read_to_string(&xml_file)
                .map_err(|source_err| read_error(&source.mod_id, xml_file.clone(), source_err))?;
            let defs = parse_defs_document(&source.mod_id, &xml_file, &raw)?;
            for def in defs {
                if !seen_in_mod.insert((def.tag(), def.def_name().to_string())) {
                    return Err(ContentCompileError {
                        code: ContentErrorCode::DuplicateDefInMod,
                        message: format!(
                            "duplicate {} '{}' in mod '{}'; each mod may define a defName only once",
                            def.tag(),
                            def.def_name(),
                            source.mod_id
                        ),
                        mod_id: source.mod_id.clone(),
                        file_path: xml_file.clone(),
                        location: None,
                    });
                }
                // Cross-mod duplicates are override points (last mod wins).
                match def {
                    PendingDef::Player(def) => {
                        players.insert(def.def_name.clone(), def);
                    }
                    PendingDef::Hazard(def) => {
                        hazards.insert(def.def_name.clone(), def);
                    }
                }
            }
        }
    }

    Ok(DefDatabase::from_defs(
        players.into_values().collect(),
        hazards.into_values().collect(),
    ))
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<PendingDef>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let source = DefSource {
        mod_id,
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(source.error_at(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = Vec::<PendingDef>::new();
    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            PLAYER_DEF_TAG => defs.push(PendingDef::Player(parse_player_def(&source, child)?)),
            HAZARD_DEF_TAG => defs.push(PendingDef::Hazard(parse_hazard_def(&source, child)?)),
            other => {
                return Err(source.error_at(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{}>; expected <{}> or <{}>",
                        other, PLAYER_DEF_TAG, HAZARD_DEF_TAG
                    ),
                    child,
                ))
            }
        }
    }

    Ok(defs)
}

fn parse_player_def(
    source: &DefSource<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PlayerDef, ContentCompileError> {
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut max_health: Option<u32> = None;
    let mut spawn_position: Option<Vec3> = None;
    let mut spawn_yaw_degrees: Option<f32> = None;

    for field in source.unique_fields(node, PLAYER_DEF_TAG)? {
        match field.tag_name().name() {
            "defName" => def_name = Some(source.required_text(field, "defName")?),
            "label" => label = Some(source.required_text(field, "label")?),
            "maxHealth" => {
                let parsed = source.parse_u32(field, "maxHealth")?;
                if parsed == 0 {
                    return Err(source.error_at(
                        ContentErrorCode::InvalidValue,
                        "maxHealth must be > 0".to_string(),
                        field,
                    ));
                }
                max_health = Some(parsed);
            }
            "spawnPosition" => spawn_position = Some(source.parse_vec3(field, "spawnPosition")?),
            "spawnYawDegrees" => {
                spawn_yaw_degrees = Some(source.parse_f32(field, "spawnYawDegrees")?)
            }
            _ => return Err(source.unknown_field(field, PLAYER_DEF_TAG)),
        }
    }

    let def_name = def_name.ok_or_else(|| source.missing("defName", PLAYER_DEF_TAG, node))?;
    let label = label.ok_or_else(|| source.missing("label", PLAYER_DEF_TAG, node))?;
    let max_health =
        max_health.ok_or_else(|| source.missing("maxHealth", PLAYER_DEF_TAG, node))?;
    if spawn_position.is_none() && spawn_yaw_degrees.is_some() {
        return Err(source.missing("spawnPosition", PLAYER_DEF_TAG, node));
    }

    Ok(PlayerDef {
        id: PlayerDefId(0),
        def_name,
        label,
        max_health,
        spawn: spawn_position.map(|position| Pose {
            position,
            yaw_degrees: spawn_yaw_degrees.unwrap_or(0.0),
        }),
    })
}

fn parse_hazard_def(
    source: &DefSource<'_, '_>,
    node: Node<'_, '_>,
) -> Result<HazardDef, ContentCompileError> {
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut kind: Option<HazardKind> = None;
    let mut damage_per_tick: Option<u32> = None;
    let mut tick_interval_seconds: Option<f32> = None;
    let mut immunity = ImmunityRule::None;
    let mut overlay = true;

    for field in source.unique_fields(node, HAZARD_DEF_TAG)? {
        match field.tag_name().name() {
            "defName" => def_name = Some(source.required_text(field, "defName")?),
            "label" => label = Some(source.required_text(field, "label")?),
            "kind" => {
                let value = source.required_text(field, "kind")?;
                kind = Some(match value.as_str() {
                    "Gas" => HazardKind::Gas,
                    "Water" => HazardKind::Water,
                    _ => {
                        return Err(source.error_at(
                            ContentErrorCode::InvalidValue,
                            format!("invalid kind '{}'; allowed values: Gas, Water", value),
                            field,
                        ))
                    }
                });
            }
            "damagePerTick" => damage_per_tick = Some(source.parse_u32(field, "damagePerTick")?),
            "tickIntervalSeconds" => {
                let parsed = source.parse_f32(field, "tickIntervalSeconds")?;
                if parsed <= 0.0 {
                    return Err(source.error_at(
                        ContentErrorCode::InvalidValue,
                        "tickIntervalSeconds must be > 0".to_string(),
                        field,
                    ));
                }
                tick_interval_seconds = Some(parsed);
            }
            "immunity" => {
                let value = source.required_text(field, "immunity")?;
                immunity = match value.as_str() {
                    "None" => ImmunityRule::None,
                    "GasMask" => ImmunityRule::GasMask,
                    _ => {
                        return Err(source.error_at(
                            ContentErrorCode::InvalidValue,
                            format!("invalid immunity '{}'; allowed values: None, GasMask", value),
                            field,
                        ))
                    }
                };
            }
            "overlay" => overlay = source.parse_bool(field, "overlay")?,
            _ => return Err(source.unknown_field(field, HAZARD_DEF_TAG)),
        }
    }

    let def_name = def_name.ok_or_else(|| source.missing("defName", HAZARD_DEF_TAG, node))?;
    let label = label.ok_or_else(|| source.missing("label", HAZARD_DEF_TAG, node))?;
    let kind = kind.ok_or_else(|| source.missing("kind", HAZARD_DEF_TAG, node))?;
    let damage_per_tick =
        damage_per_tick.ok_or_else(|| source.missing("damagePerTick", HAZARD_DEF_TAG, node))?;
    let tick_interval_seconds = tick_interval_seconds
        .ok_or_else(|| source.missing("tickIntervalSeconds", HAZARD_DEF_TAG, node))?;

    Ok(HazardDef {
        id: HazardDefId(0),
        def_name,
        label,
        kind,
        damage_per_tick,
        tick_interval_seconds,
        immunity,
        overlay,
    })
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<(String, PathBuf)>::new();
    collect_recursive(root, root, &mut files)?;
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<(String, PathBuf)>,
) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            files.push((normalize_rel_path(rel), path.clone()));
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentPlanError, root: &Path) -> ContentCompileError {
    match error {
        ContentPlanError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check enabled mod list",
                mod_id,
                expected_dir.display()
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: root.to_path_buf(),
            location: None,
        },
    }
}
