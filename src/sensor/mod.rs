pub mod bmpe;
