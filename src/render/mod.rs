pub mod coordinate_mapper;
pub mod label_drawing;
pub mod plot_interaction;
