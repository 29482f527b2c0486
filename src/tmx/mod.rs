//! TMX map model.
//!
//! A [`Map`] keeps the parsed document tree so that anything the scripter
//! does not understand (tilesets, object groups, properties, comments)
//! survives the parse/serialize round trip. Top-level `<layer>` elements
//! are lifted into [`Layer`] values whose tile data stays in its encoded
//! form until a grid is requested.
//!
//! # Tile data
//!
//! | encoding          | decode / encode | round trip |
//! |-------------------|-----------------|------------|
//! | XML `<tile gid>`  | yes             | yes        |
//! | `csv`             | yes             | yes        |
//! | `base64`          | no              | yes        |
//! | chunked (infinite)| no              | yes        |

mod grid;
mod xml;

pub use grid::{
    FLIPPED_DIAGONALLY, FLIPPED_HORIZONTALLY, FLIPPED_VERTICALLY, GridTile, MAX_TILE_ID, TileGrid,
};
pub use xml::{Attributes, Declaration, Document, Element, Node};

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use xml::{get_attribute, parse_document, remove_attribute, set_attribute, write_document};

#[derive(Debug, Error)]
pub enum MapError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("root element is <{0}>, expected <map>")]
    NotAMap(String),

    #[error("<{element}> is missing the {attribute} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("<{element}> has an invalid {attribute} value {value:?}")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("layer {layer:?} has no <data> element")]
    MissingData { layer: String },

    #[error("layer {layer:?}: {encoding} tile data cannot be decoded")]
    UnsupportedEncoding { layer: String, encoding: String },

    #[error("layer {layer:?}: chunked tile data cannot be decoded")]
    ChunkedData { layer: String },

    #[error("layer {layer:?}: invalid tile gid {value:?}")]
    InvalidGid { layer: String, value: String },

    #[error("layer {layer:?}: expected {expected} tiles, found {found}")]
    TileCount {
        layer: String,
        expected: usize,
        found: usize,
    },

    #[error("no layer at index {0}")]
    NoSuchLayer(usize),

    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("could not write XML: {0}")]
    Write(String),
}

/// Encoding of a layer's `<data>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataEncoding {
    /// One `<tile gid="…"/>` child per cell.
    Xml,
    #[default]
    Csv,
    Base64,
}

impl DataEncoding {
    fn from_attribute(value: Option<&str>) -> Result<Self, MapError> {
        match value {
            None => Ok(Self::Xml),
            Some("csv") => Ok(Self::Csv),
            Some("base64") => Ok(Self::Base64),
            Some(other) => Err(MapError::InvalidAttribute {
                element: "data",
                attribute: "encoding",
                value: other.to_string(),
            }),
        }
    }

    fn attribute(self) -> Option<&'static str> {
        match self {
            Self::Xml => None,
            Self::Csv => Some("csv"),
            Self::Base64 => Some("base64"),
        }
    }
}

impl fmt::Display for DataEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Xml => "xml",
            Self::Csv => "csv",
            Self::Base64 => "base64",
        })
    }
}

impl FromStr for DataEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(Self::Xml),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unsupported layer encoding {other:?}, expected csv or xml")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    /// Decoded `<tile>` children.
    Gids(Vec<u32>),
    /// Text content of a csv or base64 `<data>` element.
    Text(String),
    /// Anything else (`<chunk>` children), kept verbatim.
    Nodes(Vec<Node>),
}

/// A layer's persisted tile data.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TileData {
    attributes: Attributes,
    encoding: DataEncoding,
    payload: Payload,
}

impl TileData {
    fn from_element(element: Element) -> Result<Self, MapError> {
        let encoding = DataEncoding::from_attribute(element.attribute("encoding"))?;
        let chunked = element.elements().any(|child| child.name == "chunk");
        let payload = match encoding {
            _ if chunked => Payload::Nodes(element.children),
            DataEncoding::Xml => {
                let mut gids = Vec::new();
                for tile in element.elements().filter(|child| child.name == "tile") {
                    let gid: u32 = match tile.attribute("gid") {
                        Some(value) => value.trim().parse().map_err(|_| MapError::InvalidAttribute {
                            element: "tile",
                            attribute: "gid",
                            value: value.to_string(),
                        })?,
                        None => 0,
                    };
                    gids.push(gid);
                }
                Payload::Gids(gids)
            }
            DataEncoding::Csv | DataEncoding::Base64 => Payload::Text(element.text()),
        };
        Ok(Self {
            attributes: element.attributes,
            encoding,
            payload,
        })
    }

    fn encode(grid: &TileGrid, encoding: DataEncoding, mut attributes: Attributes) -> Self {
        let gids = grid.to_gids();
        let payload = match encoding {
            DataEncoding::Xml => Payload::Gids(gids),
            DataEncoding::Csv | DataEncoding::Base64 => Payload::Text(csv_text(&gids, grid.width())),
        };
        let encoding = match encoding {
            DataEncoding::Base64 => DataEncoding::Csv,
            other => other,
        };
        match encoding.attribute() {
            Some(value) => set_attribute(&mut attributes, "encoding", value),
            None => remove_attribute(&mut attributes, "encoding"),
        }
        remove_attribute(&mut attributes, "compression");
        Self {
            attributes,
            encoding,
            payload,
        }
    }

    fn decode(&self, layer: &str, width: usize, height: usize) -> Result<TileGrid, MapError> {
        let gids = match (&self.payload, self.encoding) {
            (Payload::Nodes(_), _) => {
                return Err(MapError::ChunkedData {
                    layer: layer.to_string(),
                });
            }
            (_, DataEncoding::Base64) => {
                let encoding = match get_attribute(&self.attributes, "compression") {
                    Some(compression) => format!("base64 ({compression})"),
                    None => "base64".to_string(),
                };
                return Err(MapError::UnsupportedEncoding {
                    layer: layer.to_string(),
                    encoding,
                });
            }
            (Payload::Gids(gids), _) => gids.clone(),
            (Payload::Text(text), _) => parse_csv(layer, text)?,
        };
        let found = gids.len();
        TileGrid::from_gids(width, height, &gids).ok_or_else(|| MapError::TileCount {
            layer: layer.to_string(),
            expected: width * height,
            found,
        })
    }

    fn to_element(&self) -> Element {
        let children = match &self.payload {
            Payload::Gids(gids) => gids
                .iter()
                .map(|gid| {
                    let mut tile = Element::new("tile");
                    tile.attributes.push(("gid".to_string(), gid.to_string()));
                    Node::Element(tile)
                })
                .collect(),
            Payload::Text(text) => vec![Node::Text(text.clone())],
            Payload::Nodes(nodes) => nodes.clone(),
        };
        Element {
            name: "data".to_string(),
            attributes: self.attributes.clone(),
            children,
        }
    }
}

fn parse_csv(layer: &str, text: &str) -> Result<Vec<u32>, MapError> {
    text.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<u32>().map_err(|_| MapError::InvalidGid {
                layer: layer.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Tiled's csv layout: one row per line, wrapped in newlines.
fn csv_text(gids: &[u32], width: usize) -> String {
    let rows: Vec<String> = gids
        .chunks(width.max(1))
        .map(|row| {
            row.iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    format!("\n{}\n", rows.join(",\n"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LayerChild {
    Data,
    Other(Node),
}

/// A named tile layer owned by a [`Map`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    name: String,
    width: u32,
    height: u32,
    attributes: Attributes,
    children: Vec<LayerChild>,
    data: TileData,
}

impl Layer {
    /// A layer of empty tiles, encoded with `encoding`.
    pub fn new(name: impl Into<String>, width: u32, height: u32, encoding: DataEncoding) -> Self {
        let name = name.into();
        let attributes = vec![
            ("name".to_string(), name.clone()),
            ("width".to_string(), width.to_string()),
            ("height".to_string(), height.to_string()),
        ];
        let grid = TileGrid::new(width as usize, height as usize);
        Self {
            name,
            width,
            height,
            attributes,
            children: vec![LayerChild::Data],
            data: TileData::encode(&grid, encoding, Vec::new()),
        }
    }

    fn from_element(element: Element) -> Result<Self, MapError> {
        let name = element.attribute("name").unwrap_or_default().to_string();
        let width = required_u32(&element, "layer", "width")?;
        let height = required_u32(&element, "layer", "height")?;

        let mut data = None;
        let mut children = Vec::with_capacity(element.children.len());
        for child in element.children {
            match child {
                Node::Element(el) if el.name == "data" && data.is_none() => {
                    data = Some(TileData::from_element(el)?);
                    children.push(LayerChild::Data);
                }
                other => children.push(LayerChild::Other(other)),
            }
        }
        let data = data.ok_or_else(|| MapError::MissingData {
            layer: name.clone(),
        })?;
        Ok(Self {
            name,
            width,
            height,
            attributes: element.attributes,
            children,
            data,
        })
    }

    fn to_element(&self) -> Element {
        let children = self
            .children
            .iter()
            .map(|child| match child {
                LayerChild::Data => Node::Element(self.data.to_element()),
                LayerChild::Other(node) => node.clone(),
            })
            .collect();
        Element {
            name: "layer".to_string(),
            attributes: self.attributes.clone(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        get_attribute(&self.attributes, key)
    }

    pub fn encoding(&self) -> DataEncoding {
        self.data.encoding
    }

    /// Decodes the persisted tile data into a fresh grid.
    pub fn grid(&self) -> Result<TileGrid, MapError> {
        self.data
            .decode(&self.name, self.width as usize, self.height as usize)
    }

    /// Replaces the persisted tile data with `grid`.
    ///
    /// The layer keeps its encoding; base64 layers are rewritten as csv.
    pub fn set_grid(&mut self, grid: &TileGrid) {
        self.data = TileData::encode(grid, self.data.encoding, self.data.attributes.clone());
    }
}

fn required_u32(
    element: &Element,
    name: &'static str,
    attribute: &'static str,
) -> Result<u32, MapError> {
    let value = element.attribute(attribute).ok_or(MapError::MissingAttribute {
        element: name,
        attribute,
    })?;
    value.trim().parse().map_err(|_| MapError::InvalidAttribute {
        element: name,
        attribute,
        value: value.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MapChild {
    Layer(usize),
    Other(Node),
}

/// A parsed tile map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    declaration: Option<Declaration>,
    prolog: Vec<Node>,
    attributes: Attributes,
    width: u32,
    height: u32,
    children: Vec<MapChild>,
    layers: Vec<Layer>,
}

/// Parses a TMX document.
pub fn parse_map_string(input: &str) -> Result<Map, MapError> {
    Map::from_document(parse_document(input)?)
}

/// Parses a TMX document from raw bytes, which must be UTF-8.
pub fn parse_map_bytes(input: Vec<u8>) -> Result<Map, MapError> {
    parse_map_string(&String::from_utf8(input)?)
}

impl Map {
    fn from_document(document: Document) -> Result<Self, MapError> {
        let root = document.root;
        if root.name != "map" {
            return Err(MapError::NotAMap(root.name));
        }
        let width = required_u32(&root, "map", "width")?;
        let height = required_u32(&root, "map", "height")?;

        let mut layers = Vec::new();
        let mut children = Vec::with_capacity(root.children.len());
        for child in root.children {
            match child {
                Node::Element(el) if el.name == "layer" => {
                    children.push(MapChild::Layer(layers.len()));
                    layers.push(Layer::from_element(el)?);
                }
                other => children.push(MapChild::Other(other)),
            }
        }
        Ok(Self {
            declaration: document.declaration,
            prolog: document.prolog,
            attributes: root.attributes,
            width,
            height,
            children,
            layers,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        get_attribute(&self.attributes, key)
    }

    /// Layers in document order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    /// Index of the first layer called `name`.
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.name == name)
    }

    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layer_index(name).and_then(|index| self.layers.get(index))
    }

    /// Appends an empty layer sized to the map and returns its index.
    ///
    /// When the map tracks `nextlayerid`, the layer takes that id and the
    /// counter advances.
    pub fn add_layer(&mut self, name: impl Into<String>, encoding: DataEncoding) -> usize {
        let mut layer = Layer::new(name, self.width, self.height, encoding);
        if let Some(next) = self
            .attribute("nextlayerid")
            .and_then(|value| value.trim().parse::<u32>().ok())
        {
            layer.attributes.insert(0, ("id".to_string(), next.to_string()));
            set_attribute(&mut self.attributes, "nextlayerid", (next + 1).to_string());
        }

        let index = self.layers.len();
        self.layers.push(layer);
        // New layers go after the last existing layer so they draw on top.
        let position = self
            .children
            .iter()
            .rposition(|child| matches!(child, MapChild::Layer(_)))
            .map_or(self.children.len(), |last| last + 1);
        self.children.insert(position, MapChild::Layer(index));
        index
    }

    fn to_document(&self) -> Document {
        let children = self
            .children
            .iter()
            .map(|child| match child {
                MapChild::Layer(index) => Node::Element(self.layers[*index].to_element()),
                MapChild::Other(node) => node.clone(),
            })
            .collect();
        Document {
            declaration: self.declaration.clone(),
            prolog: self.prolog.clone(),
            root: Element {
                name: "map".to_string(),
                attributes: self.attributes.clone(),
                children,
            },
        }
    }

    /// Writes the map back out as a TMX document.
    pub fn serialize(&self) -> Result<String, MapError> {
        write_document(&self.to_document())
    }
}
