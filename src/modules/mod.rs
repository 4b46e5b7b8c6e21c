// Module exports for pure logic
pub mod closed_tabs;  // Closed-tab archive
pub mod content;      // Content loaders
pub mod groups;       // Tab groups + persistence
pub mod lifecycle;    // Readiness, command surface
pub mod panels;       // Panel registry
pub mod shortcuts;    // Keyboard bindings
pub mod tab_strip;    // Strip projection
pub mod tabs;         // Tab store + reordering logic
