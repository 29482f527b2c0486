//! Map, Layer, Grid and Tile views exposed to scripts.
//!
//! Wrappers hold a shared handle to the loaded [`Map`] and address layers
//! by index (layers are only ever appended). A [`ScriptableGrid`] owns a
//! decoded copy of its layer's tiles; edits stay in that copy until
//! [`ScriptableGrid::save`] encodes it back. Dropping a grid without saving
//! discards its edits.
//!
//! ```lua
//! addEventListener("map", function(m)
//!     local grid = m:GetLayer("ground"):GetGrid()
//!     local tile = grid:TileAt(0, 0)
//!     tile.Id = 5
//!     tile.FlipX = true
//!     grid:Save()
//! end)
//! ```

use crate::tmx::{DataEncoding, GridTile, MAX_TILE_ID, Map, MapError, TileGrid};
use log::debug;
use mlua::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct ScriptableMap {
    map: Rc<RefCell<Map>>,
    new_layer_encoding: DataEncoding,
}

impl ScriptableMap {
    pub fn new(map: Rc<RefCell<Map>>, new_layer_encoding: DataEncoding) -> Self {
        Self {
            map,
            new_layer_encoding,
        }
    }

    /// First layer called `name`, if any.
    pub fn get_layer(&self, name: &str) -> Option<ScriptableLayer> {
        let index = self.map.borrow().layer_index(name)?;
        Some(ScriptableLayer {
            map: Rc::clone(&self.map),
            index,
        })
    }

    /// Appends an empty layer sized to the map.
    pub fn add_layer(&self, name: &str) -> ScriptableLayer {
        let index = self
            .map
            .borrow_mut()
            .add_layer(name, self.new_layer_encoding);
        debug!("added layer {name:?} at index {index}");
        ScriptableLayer {
            map: Rc::clone(&self.map),
            index,
        }
    }
}

impl LuaUserData for ScriptableMap {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        // :GetLayer(name) -> Layer|nil
        methods.add_method("GetLayer", |_, this, name: String| Ok(this.get_layer(&name)));

        // :AddLayer(name) -> Layer
        methods.add_method("AddLayer", |_, this, name: String| Ok(this.add_layer(&name)));
    }
}

#[derive(Debug, Clone)]
pub struct ScriptableLayer {
    map: Rc<RefCell<Map>>,
    index: usize,
}

impl ScriptableLayer {
    pub fn name(&self) -> String {
        self.map
            .borrow()
            .layer(self.index)
            .map(|layer| layer.name().to_string())
            .unwrap_or_default()
    }

    /// Decodes the layer's current tile data into a new snapshot.
    pub fn grid(&self) -> Result<ScriptableGrid, MapError> {
        let grid = self
            .map
            .borrow()
            .layer(self.index)
            .ok_or(MapError::NoSuchLayer(self.index))?
            .grid()?;
        Ok(ScriptableGrid {
            layer: self.clone(),
            grid: Rc::new(RefCell::new(grid)),
        })
    }
}

impl LuaUserData for ScriptableLayer {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        // :GetGrid() -> Grid
        methods.add_method("GetGrid", |_, this, ()| {
            this.grid().map_err(LuaError::external)
        });

        methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
            Ok(format!("Layer({:?})", this.name()))
        });
    }
}

#[derive(Debug, Clone)]
pub struct ScriptableGrid {
    layer: ScriptableLayer,
    grid: Rc<RefCell<TileGrid>>,
}

impl ScriptableGrid {
    pub fn width(&self) -> usize {
        self.grid.borrow().width()
    }

    pub fn height(&self) -> usize {
        self.grid.borrow().height()
    }

    /// Cell `(x, y)` of this snapshot, or `None` outside the grid.
    pub fn tile_at(&self, x: usize, y: usize) -> Option<ScriptableTile> {
        self.grid.borrow().get(x, y)?;
        Some(ScriptableTile {
            grid: Rc::clone(&self.grid),
            x,
            y,
        })
    }

    /// Every cell, `y` outer and `x` inner.
    pub fn tile_list(&self) -> Vec<ScriptableTile> {
        let (width, height) = (self.width(), self.height());
        let mut tiles = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                tiles.push(ScriptableTile {
                    grid: Rc::clone(&self.grid),
                    x,
                    y,
                });
            }
        }
        tiles
    }

    /// Encodes the snapshot into its layer, replacing the layer's tiles.
    pub fn save(&self) -> Result<(), MapError> {
        let grid = self.grid.borrow();
        let mut map = self.layer.map.borrow_mut();
        let layer = map
            .layer_mut(self.layer.index)
            .ok_or(MapError::NoSuchLayer(self.layer.index))?;
        layer.set_grid(&grid);
        debug!("saved {}x{} grid into layer {:?}", grid.width(), grid.height(), layer.name());
        Ok(())
    }
}

impl LuaUserData for ScriptableGrid {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("Width", |_, this, ()| Ok(this.width()));
        methods.add_method("Height", |_, this, ()| Ok(this.height()));

        // :TileAt(x, y) -> Tile, zero-based
        methods.add_method("TileAt", |_, this, (x, y): (i64, i64)| {
            let cell = usize::try_from(x)
                .ok()
                .zip(usize::try_from(y).ok())
                .and_then(|(x, y)| this.tile_at(x, y));
            cell.ok_or_else(|| {
                LuaError::runtime(format!(
                    "TileAt({x}, {y}) is outside the {}x{} grid",
                    this.width(),
                    this.height()
                ))
            })
        });

        // :TileList() -> Tile[], row-major
        methods.add_method("TileList", |_, this, ()| Ok(this.tile_list()));

        // :Save() commits the snapshot into its layer
        methods.add_method("Save", |_, this, ()| this.save().map_err(LuaError::external));
    }
}

/// One cell of a [`ScriptableGrid`] snapshot.
#[derive(Debug, Clone)]
pub struct ScriptableTile {
    grid: Rc<RefCell<TileGrid>>,
    x: usize,
    y: usize,
}

impl ScriptableTile {
    pub fn get(&self) -> GridTile {
        self.grid
            .borrow()
            .get(self.x, self.y)
            .copied()
            .unwrap_or_default()
    }

    pub fn update(&self, edit: impl FnOnce(&mut GridTile)) {
        if let Some(tile) = self.grid.borrow_mut().get_mut(self.x, self.y) {
            edit(tile);
        }
    }

    /// Sets the identifier, rejecting fractions and values that overlap the
    /// flip bits.
    pub fn set_id(&self, id: f64) -> Result<(), String> {
        if id.fract() != 0.0 {
            return Err(format!("tile id {id} is not an integer"));
        }
        if !(0.0..=f64::from(MAX_TILE_ID)).contains(&id) {
            return Err(format!("tile id {id} is out of range (0..={MAX_TILE_ID})"));
        }
        let id = id as u32;
        self.update(|tile| tile.id = id);
        Ok(())
    }
}

impl LuaUserData for ScriptableTile {
    fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("Id", |_, this| Ok(this.get().id));
        fields.add_field_method_set("Id", |_, this, id: f64| {
            this.set_id(id).map_err(LuaError::runtime)
        });

        fields.add_field_method_get("FlipX", |_, this| Ok(this.get().flip_x));
        fields.add_field_method_set("FlipX", |_, this, flip: bool| {
            this.update(|tile| tile.flip_x = flip);
            Ok(())
        });

        fields.add_field_method_get("FlipY", |_, this| Ok(this.get().flip_y));
        fields.add_field_method_set("FlipY", |_, this, flip: bool| {
            this.update(|tile| tile.flip_y = flip);
            Ok(())
        });

        fields.add_field_method_get("FlipD", |_, this| Ok(this.get().flip_d));
        fields.add_field_method_set("FlipD", |_, this, flip: bool| {
            this.update(|tile| tile.flip_d = flip);
            Ok(())
        });
    }

    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
            let tile = this.get();
            Ok(format!("Tile({}, {}, id={})", this.x, this.y, tile.id))
        });
    }
}
